//! Sequence execution: the runner state machine, the trace it records and
//! the reproduction records built from failed traces.

pub mod failure;
pub mod replay;
pub mod report;
pub mod runner;
pub mod trace;

pub use failure::SequenceFailure;
pub use replay::{replay, ReplayError, ReplayOutcome};
pub use report::{ReproductionRecord, StreamMode};
pub use runner::{Interrupt, NoInterrupt, SequenceOutcome, SequenceRunner, SequenceState};
pub use trace::{SequenceTrace, TraceStep};
