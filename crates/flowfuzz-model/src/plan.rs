//! Explicit registration of flows and invariants.
//!
//! ```ignore
//! let plan = FuzzPlan::builder()
//!     .flow(FlowDef::new("deposit").arg("amount", ArgSpec::int(20, 200, 0.05)))
//!     .flow(FlowDef::new("withdraw").arg("percent", ArgSpec::float(0.0, 1.0)))
//!     .invariant(InvariantDef::new("utility", |sut: &Pool| sut.utility()))
//!     .build()?;
//! ```

use crate::flow::{FlowDef, FlowRegistry, RegistryError};
use crate::invariant::{InvariantDef, InvariantError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("flow registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("invariant registration failed: {0}")]
    Invariant(#[from] InvariantError),
}

/// Everything a sequence needs to know about the test: which flows exist and
/// which invariants to enforce. Immutable once built; shared by all sequences.
pub struct FuzzPlan<S> {
    flows: FlowRegistry<S>,
    invariants: Vec<InvariantDef<S>>,
}

impl<S> FuzzPlan<S> {
    pub fn builder() -> FuzzPlanBuilder<S> {
        FuzzPlanBuilder::new()
    }

    pub fn flows(&self) -> &FlowRegistry<S> {
        &self.flows
    }

    pub fn invariants(&self) -> &[InvariantDef<S>] {
        &self.invariants
    }
}

impl<S> std::fmt::Debug for FuzzPlan<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuzzPlan")
            .field("flows", &self.flows)
            .field("invariants", &self.invariants)
            .finish()
    }
}

pub struct FuzzPlanBuilder<S> {
    flows: Vec<FlowDef<S>>,
    invariants: Vec<InvariantDef<S>>,
}

impl<S> FuzzPlanBuilder<S> {
    pub fn new() -> Self {
        Self {
            flows: Vec::new(),
            invariants: Vec::new(),
        }
    }

    pub fn flow(mut self, flow: FlowDef<S>) -> Self {
        self.flows.push(flow);
        self
    }

    pub fn invariant(mut self, invariant: InvariantDef<S>) -> Self {
        self.invariants.push(invariant);
        self
    }

    /// Validate every registration. Generator misconfiguration surfaces here,
    /// before any sequence runs.
    pub fn build(self) -> Result<FuzzPlan<S>, PlanError> {
        let mut flows = FlowRegistry::new();
        for flow in self.flows {
            flows.register(flow)?;
        }
        flows.ensure_selectable()?;

        for (i, inv) in self.invariants.iter().enumerate() {
            inv.validate()?;
            if self.invariants[..i].iter().any(|o| o.name() == inv.name()) {
                return Err(InvariantError::Duplicate(inv.name().to_string()).into());
            }
        }

        Ok(FuzzPlan {
            flows,
            invariants: self.invariants,
        })
    }
}

impl<S> Default for FuzzPlanBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}
