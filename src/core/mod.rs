pub mod engine;
pub mod pipeline;

pub use crate::domain::model::{Portfolio, ScreeningOutput, SiteRecord};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
pub use engine::ScreeningEngine;
pub use pipeline::ScreeningPipeline;
