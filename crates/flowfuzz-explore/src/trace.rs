use flowfuzz_gen::Args;
use flowfuzz_model::{CheckRecord, Observed, StateSnapshot};
use serde::{Deserialize, Serialize};

/// One executed flow, for replay and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    /// 1-based index of the flow within its sequence.
    pub step: u64,
    pub flow: String,
    pub args: Args,
    /// `None` when the flow itself failed.
    pub snapshot: Option<StateSnapshot>,
    /// Invariant checks that ran after this flow.
    pub checks: Vec<CheckRecord>,
}

/// Everything one sequence did, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceTrace {
    /// SUT state before the first flow.
    pub initial_snapshot: Option<StateSnapshot>,
    /// Baseline value per invariant, captured during setup.
    pub baseline: Vec<(String, Observed)>,
    steps: Vec<TraceStep>,
}

impl SequenceTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_flow(&mut self, flow: &str, args: Args, snapshot: Option<StateSnapshot>) -> u64 {
        let step = self.steps.len() as u64 + 1;
        self.steps.push(TraceStep {
            step,
            flow: flow.to_string(),
            args,
            snapshot,
            checks: Vec::new(),
        });
        step
    }

    /// Attach check results to the most recent step.
    pub fn attach_checks(&mut self, checks: Vec<CheckRecord>) {
        if let Some(last) = self.steps.last_mut() {
            last.checks.extend(checks);
        }
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn last(&self) -> Option<&TraceStep> {
        self.steps.last()
    }

    /// The (flow, arguments) pairs in execution order.
    pub fn calls(&self) -> Vec<(String, Args)> {
        self.steps
            .iter()
            .map(|s| (s.flow.clone(), s.args.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
