pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::LocalStorage;
pub use app::server::{router, serve, AppState};
pub use config::{training::TrainingConfig, ClientConfig, ServeConfig};
pub use crate::core::pipeline::InferencePipeline;
pub use crate::core::training::TrainingJob;
pub use utils::error::{AppError, Result};
