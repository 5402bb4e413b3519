//! Campaign time budget and stop reasons.

use std::time::{Duration, Instant};

use flowfuzz_explore::Interrupt;
use serde::{Deserialize, Serialize};

/// Why a campaign stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every sequence ran.
    Complete,
    /// A sequence failed under [`crate::FailurePolicy::FailFast`].
    FailFast,
    /// The wall-clock budget ran out between flows.
    TimeLimit,
}

/// Wall-clock deadline, polled by runners between flows.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn new(limit_secs: Option<u64>) -> Self {
        Self {
            start: Instant::now(),
            limit: limit_secs.map(Duration::from_secs),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn exceeded(&self) -> bool {
        match self.limit {
            Some(limit) => self.start.elapsed() >= limit,
            None => false,
        }
    }
}

impl Interrupt for Deadline {
    fn interrupted(&self) -> bool {
        self.exceeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_never_exceeds() {
        let deadline = Deadline::unlimited();
        assert!(!deadline.exceeded());
        assert!(!deadline.interrupted());
    }

    #[test]
    fn test_generous_limit_not_exceeded() {
        let deadline = Deadline::new(Some(3600));
        assert!(!deadline.exceeded());
    }
}
