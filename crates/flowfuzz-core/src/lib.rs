//! Campaign orchestration: configuration, the time budget and the drivers
//! that run sequences and collect reproduction records.

pub mod campaign;
pub mod config;
pub mod limits;

pub use campaign::{run_campaign, run_campaign_isolated, CampaignError, CampaignReport, SutFactory};
pub use config::{CampaignConfig, ConfigError, FailurePolicy};
pub use limits::{Deadline, StopReason};
