pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod report;
pub mod rules;
pub mod sources;
pub mod spatial;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::{LocalStorage, ScreenConfig};
pub use core::{engine::ScreeningEngine, pipeline::ScreeningPipeline};
pub use domain::model::{Portfolio, RiskCategory, SiteRecord};
pub use utils::error::{Result, ScreenError};
