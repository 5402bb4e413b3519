//! The campaign driver.
//!
//! [`run_campaign`] runs `sequences_count` sequences one after another, every
//! one drawing from a single seeded stream that is never reset, each against
//! a fresh SUT from the factory. [`run_campaign_isolated`] is the parallel
//! variant: one stream per sequence derived from `(seed, index)`, sequences
//! spread over the rayon pool, outcomes returned in index order. Isolated
//! campaigns always aggregate; fail-fast has no meaning once sequences run
//! concurrently.

use std::time::Duration;

use flowfuzz_gen::{Args, RandomStream};
use flowfuzz_explore::{
    ReproductionRecord, SequenceFailure, SequenceOutcome, SequenceRunner, SequenceState,
    SequenceTrace, StreamMode,
};
use flowfuzz_model::{FuzzPlan, SutError, SystemUnderTest};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Span};

use crate::config::{CampaignConfig, ConfigError, FailurePolicy};
use crate::limits::{Deadline, StopReason};

#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Builds one fresh SUT per sequence.
pub trait SutFactory {
    type Sut: SystemUnderTest;

    fn create(&self, sequence_index: u32) -> Result<Self::Sut, SutError>;
}

impl<S, F> SutFactory for F
where
    S: SystemUnderTest,
    F: Fn(u32) -> Result<S, SutError>,
{
    type Sut = S;

    fn create(&self, sequence_index: u32) -> Result<S, SutError> {
        self(sequence_index)
    }
}

/// Result of a complete campaign run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seed: u64,
    pub config: CampaignConfig,
    pub stream_mode: StreamMode,
    /// Outcomes in sequence-index order.
    pub sequences: Vec<SequenceOutcome>,
    /// One reproduction record per failed sequence.
    pub failures: Vec<ReproductionRecord>,
    pub stop_reason: StopReason,
    /// Flows attempted across all sequences, rejected ones included.
    pub total_flows: u64,
    pub total_checks: u64,
    pub elapsed: Duration,
}

impl CampaignReport {
    fn assemble(
        config: &CampaignConfig,
        stream_mode: StreamMode,
        sequences: Vec<SequenceOutcome>,
        stop_reason: StopReason,
        elapsed: Duration,
    ) -> Self {
        let failures = sequences
            .iter()
            .filter_map(|o| {
                ReproductionRecord::from_outcome(config.seed, stream_mode, config.flows_count, o)
            })
            .collect();
        let total_flows = sequences.iter().map(|o| o.trace.len() as u64).sum();
        let total_checks = sequences.iter().map(|o| o.checks_run).sum();

        Self {
            seed: config.seed,
            config: config.clone(),
            stream_mode,
            sequences,
            failures,
            stop_reason,
            total_flows,
            total_checks,
            elapsed,
        }
    }

    /// No sequence failed. An interrupted campaign can still succeed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn first_failure(&self) -> Option<&ReproductionRecord> {
        self.failures.first()
    }

    /// Executed (flow, arguments) pairs, one list per sequence.
    pub fn calls(&self) -> Vec<Vec<(String, Args)>> {
        self.sequences.iter().map(|o| o.trace.calls()).collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn log_summary(&self) {
        info!(
            sequences = self.sequences.len(),
            failures = self.failures.len(),
            flows = self.total_flows,
            checks = self.total_checks,
            stop = ?self.stop_reason,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "campaign finished"
        );
        for record in &self.failures {
            warn!(
                sequence = record.sequence_index,
                kind = record.failure.kind(),
                "sequence failed: {}",
                record.failure
            );
        }
    }
}

fn factory_failed(index: u32, draws_before: u64, err: SutError) -> SequenceOutcome {
    SequenceOutcome {
        index,
        state: SequenceState::Failed,
        trace: SequenceTrace::new(),
        failure: Some(SequenceFailure::SetupFailure {
            message: format!("SUT construction failed: {err}"),
        }),
        flow_counts: Default::default(),
        checks_run: 0,
        draws_before,
    }
}

fn run_one<F: SutFactory>(
    index: u32,
    plan: &FuzzPlan<F::Sut>,
    factory: &F,
    stream: &mut RandomStream,
    flows_count: u64,
    deadline: &Deadline,
) -> SequenceOutcome {
    match factory.create(index) {
        Ok(mut sut) => SequenceRunner::new(index, plan, &mut sut, stream).run(flows_count, deadline),
        Err(err) => {
            warn!(index, error = %err, "SUT factory failed");
            factory_failed(index, stream.draws(), err)
        }
    }
}

/// Run a sequential campaign on one shared random stream.
pub fn run_campaign<F: SutFactory>(
    plan: &FuzzPlan<F::Sut>,
    factory: &F,
    config: &CampaignConfig,
) -> Result<CampaignReport, CampaignError> {
    config.validate()?;

    let span = info_span!("campaign", seed = config.seed);
    let _guard = span.enter();
    info!(
        sequences = config.sequences_count,
        flows = config.flows_count,
        policy = ?config.failure_policy,
        "campaign started"
    );

    let deadline = Deadline::new(config.time_limit_secs);
    let mut stream = RandomStream::new(config.seed);
    let mut sequences = Vec::with_capacity(config.sequences_count as usize);
    let mut stop_reason = StopReason::Complete;

    for index in 0..config.sequences_count {
        if deadline.exceeded() {
            stop_reason = StopReason::TimeLimit;
            break;
        }

        let outcome = run_one(
            index,
            plan,
            factory,
            &mut stream,
            config.flows_count,
            &deadline,
        );
        let state = outcome.state;
        sequences.push(outcome);

        if state == SequenceState::Interrupted {
            stop_reason = StopReason::TimeLimit;
            break;
        }
        if state == SequenceState::Failed && config.failure_policy == FailurePolicy::FailFast {
            stop_reason = StopReason::FailFast;
            break;
        }
    }

    let report = CampaignReport::assemble(
        config,
        StreamMode::Shared,
        sequences,
        stop_reason,
        deadline.elapsed(),
    );
    report.log_summary();
    Ok(report)
}

/// Run sequences in parallel, each with its own stream and SUT.
pub fn run_campaign_isolated<F>(
    plan: &FuzzPlan<F::Sut>,
    factory: &F,
    config: &CampaignConfig,
) -> Result<CampaignReport, CampaignError>
where
    F: SutFactory + Sync,
{
    config.validate()?;

    let span = info_span!("campaign", seed = config.seed, isolated = true);
    let _guard = span.enter();
    info!(
        sequences = config.sequences_count,
        flows = config.flows_count,
        threads = rayon::current_num_threads(),
        "isolated campaign started"
    );

    let deadline = Deadline::new(config.time_limit_secs);
    let campaign = Span::current();
    let sequences: Vec<SequenceOutcome> = (0..config.sequences_count)
        .into_par_iter()
        .map(|index| {
            campaign.in_scope(|| {
                let mut stream = RandomStream::for_sequence(config.seed, index);
                run_one(
                    index,
                    plan,
                    factory,
                    &mut stream,
                    config.flows_count,
                    &deadline,
                )
            })
        })
        .collect();

    let stop_reason = if sequences
        .iter()
        .any(|o| o.state == SequenceState::Interrupted)
    {
        StopReason::TimeLimit
    } else {
        StopReason::Complete
    };

    let report = CampaignReport::assemble(
        config,
        StreamMode::PerSequence,
        sequences,
        stop_reason,
        deadline.elapsed(),
    );
    report.log_summary();
    Ok(report)
}
