pub mod flow;
pub mod invariant;
pub mod plan;
pub mod scheduler;
pub mod sut;

pub use flow::{FlowDef, FlowRegistry, RegistryError};
pub use invariant::{Comparator, InvariantDef, InvariantError, Observed, Tolerance, Violation};
pub use plan::{FuzzPlan, FuzzPlanBuilder, PlanError};
pub use scheduler::{CheckError, CheckRecord, InvariantScheduler};
pub use sut::{StateSnapshot, SutError, SystemUnderTest};
