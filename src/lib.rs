//! Garment productivity - прогноз продуктивности швейных бригад

pub mod config;
pub mod error;
pub mod ingestion;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod preprocessing;
pub mod types;
pub mod webhook;

pub use config::{PipelineConfig, WebhookConfig};
pub use error::{PipelineError, Result, Stage};
pub use models::*;
pub use pipeline::{run, run_all, PipelineReport, Stages};
pub use preprocessing::*;
pub use types::*;
