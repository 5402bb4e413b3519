//! Decides which invariants are due after each flow and runs them.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::invariant::{InvariantDef, InvariantError, Observed, TrackedValue, Violation};
use crate::sut::SutError;

/// One invariant evaluation, kept in the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub invariant: String,
    pub step: u64,
    pub observed: Observed,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckError {
    #[error("{violation}")]
    Violation {
        violation: Violation,
        /// Checks evaluated at this step before the violation, the failing
        /// one included.
        records: Vec<CheckRecord>,
    },

    #[error("invariant '{invariant}' could not be observed at step {step}: {source}")]
    Observation {
        invariant: String,
        step: u64,
        #[source]
        source: SutError,
    },

    #[error(transparent)]
    Invariant(#[from] InvariantError),
}

/// Step counter plus the per-sequence state of every registered invariant.
///
/// A scheduler lives for exactly one sequence; a fresh one starts with no
/// baselines, so nothing leaks between sequences.
pub struct InvariantScheduler<S> {
    defs: Vec<InvariantDef<S>>,
    tracked: Vec<TrackedValue>,
    step: u64,
    initialized: bool,
}

impl<S> InvariantScheduler<S> {
    pub fn new(defs: &[InvariantDef<S>]) -> Self {
        Self {
            defs: defs.to_vec(),
            tracked: vec![TrackedValue::default(); defs.len()],
            step: 0,
            initialized: false,
        }
    }

    /// Completed flows so far.
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn last_value(&self, invariant: &str) -> Option<&Observed> {
        self.defs
            .iter()
            .position(|d| d.name() == invariant)
            .and_then(|i| self.tracked[i].last_value())
    }

    /// Capture every baseline. Must run before the first flow.
    pub fn initialize(&mut self, sut: &mut S) -> Result<Vec<(String, Observed)>, CheckError> {
        let mut baselines = Vec::with_capacity(self.defs.len());
        for (def, tracked) in self.defs.iter().zip(self.tracked.iter_mut()) {
            let value = def.baseline(sut).map_err(|source| CheckError::Observation {
                invariant: def.name().to_string(),
                step: 0,
                source,
            })?;
            tracked.initialize(def.name(), value.clone())?;
            debug!(invariant = def.name(), baseline = %value, "baseline captured");
            baselines.push((def.name().to_string(), value));
        }
        self.initialized = true;
        Ok(baselines)
    }

    /// Count one completed flow and evaluate every invariant now due, in
    /// registration order. Stops at the first violation.
    pub fn after_flow(&mut self, sut: &S) -> Result<Vec<CheckRecord>, CheckError> {
        self.step += 1;
        let step = self.step;
        let mut records = Vec::new();

        for (def, tracked) in self.defs.iter().zip(self.tracked.iter_mut()) {
            if !def.is_due(step) {
                continue;
            }

            let observed = def.observe(sut).map_err(|source| CheckError::Observation {
                invariant: def.name().to_string(),
                step,
                source,
            })?;

            match tracked.check(def.name(), def.comparator_ref(), observed.clone(), step)? {
                Ok(()) => {
                    debug!(invariant = def.name(), step, observed = %observed, "invariant holds");
                    records.push(CheckRecord {
                        invariant: def.name().to_string(),
                        step,
                        observed,
                        passed: true,
                    });
                }
                Err(violation) => {
                    warn!(%violation, "invariant violated");
                    records.push(CheckRecord {
                        invariant: def.name().to_string(),
                        step,
                        observed,
                        passed: false,
                    });
                    return Err(CheckError::Violation { violation, records });
                }
            }
        }

        Ok(records)
    }
}

impl<S> std::fmt::Debug for InvariantScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvariantScheduler")
            .field("defs", &self.defs)
            .field("tracked", &self.tracked)
            .field("step", &self.step)
            .finish()
    }
}
