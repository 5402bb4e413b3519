//! Deterministic replay of a recorded trace. No random stream is consumed:
//! every flow is re-executed with its recorded arguments and the invariant
//! schedule is re-evaluated from a fresh baseline.

use flowfuzz_model::{FuzzPlan, SystemUnderTest};
use tracing::{info, warn};

use crate::failure::SequenceFailure;
use crate::report::ReproductionRecord;
use crate::runner::SequenceCore;
use crate::trace::SequenceTrace;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplayError {
    #[error("recorded flow '{0}' is not registered in this plan")]
    UnknownFlow(String),
}

#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub failure: Option<SequenceFailure>,
    pub trace: SequenceTrace,
}

impl ReplayOutcome {
    /// True when replay failed the same way the recorded run did. Invariant
    /// violations must also name the same invariant at the same step.
    pub fn reproduces(&self, record: &ReproductionRecord) -> bool {
        let Some(failure) = &self.failure else {
            return false;
        };
        if failure.kind() != record.failure.kind() || self.trace.len() != record.trace.len() {
            return false;
        }
        match (failure, &record.failure) {
            (
                SequenceFailure::InvariantViolation { violation: got, .. },
                SequenceFailure::InvariantViolation { violation: want, .. },
            ) => got.invariant == want.invariant && got.step == want.step,
            _ => true,
        }
    }
}

/// Re-run `record` against `sut`. Stops at the first failure, which for a
/// faithful SUT is the recorded one at the recorded step.
pub fn replay<S: SystemUnderTest>(
    record: &ReproductionRecord,
    plan: &FuzzPlan<S>,
    sut: &mut S,
) -> Result<ReplayOutcome, ReplayError> {
    let calls = record.calls();
    let mut flows = Vec::with_capacity(calls.len());
    for (name, args) in calls {
        let flow = plan
            .flows()
            .get(&name)
            .ok_or_else(|| ReplayError::UnknownFlow(name.clone()))?;
        flows.push((flow, args));
    }

    info!(
        seed = record.seed,
        sequence = record.sequence_index,
        steps = flows.len(),
        "replaying sequence"
    );

    let mut core = SequenceCore::new(plan, sut);
    let mut failure = core.setup().err();
    if failure.is_none() {
        for (flow, args) in flows {
            if let Err(f) = core.apply(flow, args) {
                failure = Some(f);
                break;
            }
        }
    }

    let outcome = core.finish(record.sequence_index, record.draws_before_sequence, failure, false);
    match &outcome.failure {
        Some(f) => warn!(kind = f.kind(), %f, "replay failed"),
        None => info!("replay completed without failure"),
    }

    Ok(ReplayOutcome {
        failure: outcome.failure,
        trace: outcome.trace,
    })
}
