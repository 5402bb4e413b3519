//! The sequence runner: `Init -> Running -> {Completed, Failed}`.
//!
//! One runner drives one sequence against one SUT instance. Each iteration
//! selects a flow, generates its arguments, executes it and then hands
//! control to the invariant scheduler; a due check is never skipped. Any
//! executor error or violation ends the sequence with the trace kept up to
//! and including the failing step.

use std::collections::BTreeMap;

use flowfuzz_gen::{Args, RandomStream};
use flowfuzz_model::{
    CheckError, FlowDef, FuzzPlan, InvariantScheduler, SystemUnderTest,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::failure::SequenceFailure;
use crate::trace::SequenceTrace;

/// Checked between flows; never mid-flow.
pub trait Interrupt {
    fn interrupted(&self) -> bool;
}

/// Never interrupts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInterrupt;

impl Interrupt for NoInterrupt {
    fn interrupted(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceState {
    Init,
    Running,
    Completed,
    Failed,
    /// Stopped between flows by an [`Interrupt`] (campaign time limit).
    Interrupted,
}

/// Result of running one sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceOutcome {
    pub index: u32,
    pub state: SequenceState,
    pub trace: SequenceTrace,
    pub failure: Option<SequenceFailure>,
    /// Executions per flow name.
    pub flow_counts: BTreeMap<String, u64>,
    pub checks_run: u64,
    /// Random draws the campaign stream had consumed when this sequence began.
    pub draws_before: u64,
}

impl SequenceOutcome {
    pub fn is_failed(&self) -> bool {
        self.state == SequenceState::Failed
    }

    pub fn flows_executed(&self) -> u64 {
        self.flow_counts.values().sum()
    }
}

/// Setup, flow application and teardown, without any randomness. Shared by
/// the runner and by replay.
pub(crate) struct SequenceCore<'a, S> {
    plan: &'a FuzzPlan<S>,
    sut: &'a mut S,
    scheduler: InvariantScheduler<S>,
    pub(crate) trace: SequenceTrace,
    state: SequenceState,
    flow_counts: BTreeMap<String, u64>,
    checks_run: u64,
}

impl<'a, S: SystemUnderTest> SequenceCore<'a, S> {
    pub(crate) fn new(plan: &'a FuzzPlan<S>, sut: &'a mut S) -> Self {
        Self {
            plan,
            sut,
            scheduler: InvariantScheduler::new(plan.invariants()),
            trace: SequenceTrace::new(),
            state: SequenceState::Init,
            flow_counts: BTreeMap::new(),
            checks_run: 0,
        }
    }

    pub(crate) fn plan(&self) -> &'a FuzzPlan<S> {
        self.plan
    }

    /// `Init -> Running`: attach to the SUT, then capture every baseline.
    pub(crate) fn setup(&mut self) -> Result<(), SequenceFailure> {
        self.sut
            .pre_sequence()
            .map_err(|e| SequenceFailure::SetupFailure {
                message: e.to_string(),
            })?;
        self.trace.initial_snapshot = Some(self.sut.snapshot());

        let baseline = self
            .scheduler
            .initialize(self.sut)
            .map_err(|e| SequenceFailure::SetupFailure {
                message: e.to_string(),
            })?;
        self.trace.baseline = baseline;
        self.state = SequenceState::Running;
        Ok(())
    }

    /// Execute one flow and every invariant check it makes due.
    pub(crate) fn apply(&mut self, flow: &FlowDef<S>, args: Args) -> Result<(), SequenceFailure> {
        let step = self.scheduler.step() + 1;
        debug!(step, flow = flow.name(), args = %args, "executing flow");

        let snapshot = match flow.execute(self.sut, &args) {
            Ok(snapshot) => snapshot,
            Err(source) => {
                warn!(step, flow = flow.name(), args = %args, error = %source, "flow rejected");
                self.trace.record_flow(flow.name(), args.clone(), None);
                return Err(SequenceFailure::ExecutorFailure {
                    flow: flow.name().to_string(),
                    step,
                    args,
                    source,
                });
            }
        };

        self.trace
            .record_flow(flow.name(), args.clone(), Some(snapshot));
        *self
            .flow_counts
            .entry(flow.name().to_string())
            .or_insert(0) += 1;

        match self.scheduler.after_flow(&*self.sut) {
            Ok(records) => {
                self.checks_run += records.len() as u64;
                self.trace.attach_checks(records);
                Ok(())
            }
            Err(CheckError::Violation { violation, records }) => {
                self.checks_run += records.len() as u64;
                self.trace.attach_checks(records);
                Err(SequenceFailure::InvariantViolation {
                    violation,
                    flow: flow.name().to_string(),
                    args,
                })
            }
            Err(CheckError::Observation {
                invariant,
                step,
                source,
            }) => Err(SequenceFailure::ObservationFailure {
                invariant,
                step,
                source,
            }),
            Err(CheckError::Invariant(e)) => Err(SequenceFailure::SetupFailure {
                message: e.to_string(),
            }),
        }
    }

    /// Teardown and close the state machine.
    pub(crate) fn finish(
        mut self,
        index: u32,
        draws_before: u64,
        failure: Option<SequenceFailure>,
        interrupted: bool,
    ) -> SequenceOutcome {
        self.sut.post_sequence();

        self.state = match (&failure, interrupted) {
            (Some(_), _) => SequenceState::Failed,
            (None, true) => SequenceState::Interrupted,
            (None, false) => SequenceState::Completed,
        };

        SequenceOutcome {
            index,
            state: self.state,
            trace: self.trace,
            failure,
            flow_counts: self.flow_counts,
            checks_run: self.checks_run,
            draws_before,
        }
    }
}

/// Drives one sequence, drawing flow choices and arguments from the
/// campaign's stream.
pub struct SequenceRunner<'a, S> {
    index: u32,
    core: SequenceCore<'a, S>,
    stream: &'a mut RandomStream,
    draws_before: u64,
}

impl<'a, S: SystemUnderTest> SequenceRunner<'a, S> {
    pub fn new(
        index: u32,
        plan: &'a FuzzPlan<S>,
        sut: &'a mut S,
        stream: &'a mut RandomStream,
    ) -> Self {
        let draws_before = stream.draws();
        Self {
            index,
            core: SequenceCore::new(plan, sut),
            stream,
            draws_before,
        }
    }

    pub fn state(&self) -> SequenceState {
        self.core.state
    }

    /// Run up to `flows_count` flows.
    pub fn run(mut self, flows_count: u64, interrupt: &dyn Interrupt) -> SequenceOutcome {
        let span = info_span!("sequence", index = self.index);
        let _guard = span.enter();
        info!(flows_count, "sequence started");

        let mut interrupted = false;
        let failure = match self.core.setup() {
            Err(failure) => Some(failure),
            Ok(()) => self.run_flows(flows_count, interrupt, &mut interrupted).err(),
        };

        let outcome = self
            .core
            .finish(self.index, self.draws_before, failure, interrupted);
        match &outcome.failure {
            Some(failure) => warn!(kind = failure.kind(), %failure, "sequence failed"),
            None => info!(
                state = ?outcome.state,
                flows = outcome.flows_executed(),
                checks = outcome.checks_run,
                "sequence finished"
            ),
        }
        outcome
    }

    fn run_flows(
        &mut self,
        flows_count: u64,
        interrupt: &dyn Interrupt,
        interrupted: &mut bool,
    ) -> Result<(), SequenceFailure> {
        let plan = self.core.plan();
        for _ in 0..flows_count {
            if interrupt.interrupted() {
                info!(step = self.core.trace.len(), "sequence interrupted");
                *interrupted = true;
                return Ok(());
            }

            let flow = plan
                .flows()
                .select_next(self.stream)
                .ok_or_else(|| SequenceFailure::SetupFailure {
                    message: "no selectable flow".to_string(),
                })?;
            let args = flow
                .generate_args(self.stream)
                .map_err(|e| SequenceFailure::generator(flow.name(), e))?;

            self.core.apply(flow, args)?;
        }
        Ok(())
    }
}
