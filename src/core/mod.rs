pub mod artifact;
pub mod features;
pub mod pipeline;
pub mod schema;
pub mod training;

pub use crate::domain::model::{FeatureRow, PredictionResponse, RawPredictionRequest};
pub use crate::domain::ports::{DatasetSource, Predictor, Storage};
pub use crate::utils::error::Result;
