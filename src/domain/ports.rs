use crate::domain::model::{FeatureRow, PredictionResponse};
use crate::utils::error::{InferenceError, Result};
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Human-readable location of `path`, for logs and summaries.
    fn locate(&self, path: &str) -> String;
}

/// A fitted model that scores one row at a time. Implementations are
/// read-only after construction so they can be shared across requests.
pub trait Predictor: Send + Sync + 'static {
    fn predict(&self, row: &FeatureRow) -> std::result::Result<PredictionResponse, InferenceError>;

    /// Probes the fitted state without scoring anything.
    fn readiness(&self) -> std::result::Result<(), String>;
}

/// Where the labeled training CSV comes from.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>>;

    fn location(&self) -> &str;
}
