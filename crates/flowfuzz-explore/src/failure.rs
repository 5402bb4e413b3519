use flowfuzz_gen::{Args, GenError};
use flowfuzz_model::{SutError, Violation};
use serde::{Deserialize, Serialize};

/// Why a sequence ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum SequenceFailure {
    /// Pre-sequence setup or baseline capture failed; no flow ran.
    #[error("setup failed: {message}")]
    SetupFailure { message: String },

    /// An argument generator rejected its parameters.
    #[error("argument generation for flow '{flow}' failed: {message}")]
    Generator { flow: String, message: String },

    /// The SUT rejected a flow.
    #[error("flow '{flow}' failed at step {step} with args {args}: {source}")]
    ExecutorFailure {
        flow: String,
        step: u64,
        args: Args,
        source: SutError,
    },

    /// A due invariant check failed after `flow` ran.
    #[error("{violation} after flow '{flow}' {args}")]
    InvariantViolation {
        violation: Violation,
        flow: String,
        args: Args,
    },

    /// An invariant's domain read failed.
    #[error("invariant '{invariant}' could not be observed at step {step}: {source}")]
    ObservationFailure {
        invariant: String,
        step: u64,
        source: SutError,
    },
}

impl SequenceFailure {
    pub(crate) fn generator(flow: &str, err: GenError) -> Self {
        SequenceFailure::Generator {
            flow: flow.to_string(),
            message: err.to_string(),
        }
    }

    /// Short machine-friendly label.
    pub fn kind(&self) -> &'static str {
        match self {
            SequenceFailure::SetupFailure { .. } => "setup_failure",
            SequenceFailure::Generator { .. } => "generator",
            SequenceFailure::ExecutorFailure { .. } => "executor_failure",
            SequenceFailure::InvariantViolation { .. } => "invariant_violation",
            SequenceFailure::ObservationFailure { .. } => "observation_failure",
        }
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, SequenceFailure::InvariantViolation { .. })
    }
}
