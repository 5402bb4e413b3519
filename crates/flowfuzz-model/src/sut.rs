//! The boundary between the engine and the system under test.

use flowfuzz_gen::{ArgError, Args};
use serde::{Deserialize, Serialize};

/// Opaque state snapshot returned by the SUT after a flow. The engine stores
/// it in the trace and never looks inside.
pub type StateSnapshot = serde_json::Value;

/// A rejection or failure reported by the SUT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct SutError {
    pub message: String,
}

impl SutError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn unknown_flow(flow: &str) -> Self {
        Self::new(format!("unknown flow '{flow}'"))
    }
}

impl From<ArgError> for SutError {
    fn from(err: ArgError) -> Self {
        Self::new(err.to_string())
    }
}

/// Capability interface the engine drives.
///
/// Flows registered without an explicit executor dispatch through
/// [`SystemUnderTest::call`]. Executors and invariant reads only ever see the
/// SUT and the generated arguments, never engine state.
pub trait SystemUnderTest {
    /// Attach to the target and deploy any helpers. Runs once per sequence,
    /// before baselines are captured.
    fn pre_sequence(&mut self) -> Result<(), SutError> {
        Ok(())
    }

    /// Execute the named flow.
    fn call(&mut self, flow: &str, args: &Args) -> Result<StateSnapshot, SutError>;

    /// Current state, used for the pre-sequence snapshot.
    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::Null
    }

    /// Teardown. Runs after every sequence, whatever its outcome.
    fn post_sequence(&mut self) {}
}
