pub mod training;

use crate::utils::error::{AppError, Result};
use crate::utils::validation::{validate_host, validate_path, validate_url, Validate};
use clap::Parser;
use std::net::SocketAddr;

pub const DEFAULT_MODEL_PATH: &str = "model/pipeline.json";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, Parser)]
#[command(name = "titanic-api")]
#[command(about = "Serves Titanic survival predictions over HTTP")]
pub struct ServeConfig {
    /// Fitted pipeline produced by the `train` binary
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: String,

    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "PORT", default_value = "8000")]
    pub port: u16,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, env = "LOG_JSON", help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

impl ServeConfig {
    /// Resolves `host` (IP literal or DNS name) to the first bindable address.
    pub async fn socket_addr(&self) -> Result<SocketAddr> {
        let unresolved = |reason: String| AppError::InvalidConfigValueError {
            field: "host".to_string(),
            value: format!("{}:{}", self.host, self.port),
            reason,
        };
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| unresolved(format!("cannot resolve host: {}", e)))?;
        addrs
            .next()
            .ok_or_else(|| unresolved("host resolved to no addresses".to_string()))
    }
}

impl Validate for ServeConfig {
    fn validate(&self) -> Result<()> {
        validate_path("model_path", &self.model_path)?;
        validate_host("host", &self.host)?;
        Ok(())
    }
}

/// Settings for the demo client binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "demo_client")]
#[command(about = "Posts sample passengers to a running prediction service")]
pub struct ClientConfig {
    /// Base URL of the prediction service
    #[arg(long, env = "API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    #[arg(long, default_value = "20")]
    pub timeout_seconds: u64,
}

impl ClientConfig {
    pub fn predict_url(&self) -> String {
        format!("{}/predict", self.api_url.trim_end_matches('/'))
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        validate_url("api_url", &self.api_url)
    }
}
