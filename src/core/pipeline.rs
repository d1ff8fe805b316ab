//! The fitted inference pipeline: median imputation and one-hot encoding
//! feeding a logistic-regression classifier.
//!
//! [`FeatureEncoder::encode`] is the only place a row becomes a numeric
//! vector. Training calls it on every dataset row and serving calls it on every
//! request, so both sides always see identical encodings.

use crate::core::artifact::{
    CategoryVocabularies, ClassifierParams, ImputerParams, PipelineArtifact,
    ARTIFACT_FORMAT_VERSION, CLASSIFIER_KIND, IMPUTE_STRATEGY,
};
use crate::domain::model::{
    FeatureRow, PredictionResponse, RawFeatures, Sex, Vocabulary, ENCODED_WIDTH, FEATURES_RAW,
    NUMERIC_WIDTH,
};
use crate::domain::ports::{Predictor, Storage};
use crate::utils::error::{AppError, InferenceError, Result};

pub type EncodedRow = [f64; ENCODED_WIDTH];

/// Replaces missing numeric values with per-column medians seen at training.
#[derive(Debug, Clone, PartialEq)]
pub struct MedianImputer {
    medians: [f64; NUMERIC_WIDTH],
}

impl MedianImputer {
    pub fn new(medians: [f64; NUMERIC_WIDTH]) -> Self {
        Self { medians }
    }

    pub fn medians(&self) -> &[f64; NUMERIC_WIDTH] {
        &self.medians
    }

    /// Non-finite inputs count as missing.
    pub fn fill(&self, column: usize, value: Option<f64>) -> f64 {
        value
            .filter(|v| v.is_finite())
            .unwrap_or(self.medians[column])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEncoder {
    imputer: MedianImputer,
}

impl FeatureEncoder {
    pub fn new(imputer: MedianImputer) -> Self {
        Self { imputer }
    }

    pub fn imputer(&self) -> &MedianImputer {
        &self.imputer
    }

    pub fn encode(&self, raw: &RawFeatures) -> EncodedRow {
        let mut out = [0.0; ENCODED_WIDTH];
        for (column, value) in raw.numeric.iter().enumerate() {
            out[column] = self.imputer.fill(column, *value);
        }

        let sex_offset = NUMERIC_WIDTH;
        let port_offset = sex_offset + Sex::LABELS.len();
        if let Some(sex) = raw.sex {
            out[sex_offset + sex.index()] = 1.0;
        }
        if let Some(port) = raw.embarked {
            out[port_offset + port.index()] = 1.0;
        }
        out
    }
}

/// Numerically stable logistic function.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LogisticModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.len() == ENCODED_WIDTH
            && self.coefficients.iter().all(|w| w.is_finite())
            && self.intercept.is_finite()
    }

    pub fn decision_function(&self, x: &[f64]) -> std::result::Result<f64, InferenceError> {
        if x.len() != self.coefficients.len() {
            return Err(InferenceError::WidthMismatch {
                expected: self.coefficients.len(),
                actual: x.len(),
            });
        }
        let z = self
            .coefficients
            .iter()
            .zip(x)
            .fold(self.intercept, |acc, (w, v)| acc + w * v);
        if z.is_finite() {
            Ok(z)
        } else {
            Err(InferenceError::NonFiniteScore)
        }
    }

    pub fn predict_proba(&self, x: &[f64]) -> std::result::Result<f64, InferenceError> {
        Ok(sigmoid(self.decision_function(x)?).clamp(0.0, 1.0))
    }
}

/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct InferencePipeline {
    encoder: FeatureEncoder,
    classifier: LogisticModel,
    threshold: f64,
}

impl InferencePipeline {
    pub fn new(encoder: FeatureEncoder, classifier: LogisticModel, threshold: f64) -> Self {
        Self {
            encoder,
            classifier,
            threshold,
        }
    }

    /// Reads and checks an artifact. Any failure here is fatal for serving.
    pub async fn load<S: Storage>(storage: &S, path: &str) -> Result<Self> {
        let location = storage.locate(path);
        let bytes = storage
            .read_file(path)
            .await
            .map_err(|e| artifact_error(&location, format!("unreadable: {}", e)))?;
        let artifact = PipelineArtifact::from_slice(&bytes)
            .map_err(|e| artifact_error(&location, format!("malformed JSON: {}", e)))?;
        let pipeline = Self::from_artifact(artifact).map_err(|reason| artifact_error(&location, reason))?;

        tracing::info!(
            "Loaded pipeline from {} ({} coefficients, threshold {})",
            location,
            pipeline.classifier.coefficients().len(),
            pipeline.threshold
        );
        Ok(pipeline)
    }

    pub fn from_artifact(artifact: PipelineArtifact) -> std::result::Result<Self, String> {
        artifact.check_compatibility()?;

        let medians: [f64; NUMERIC_WIDTH] = artifact
            .imputer
            .statistics
            .as_slice()
            .try_into()
            .map_err(|_| "imputer statistics have the wrong length".to_string())?;

        Ok(Self::new(
            FeatureEncoder::new(MedianImputer::new(medians)),
            LogisticModel::new(artifact.classifier.coefficients, artifact.classifier.intercept),
            artifact.classifier.threshold,
        ))
    }

    pub fn to_artifact(&self) -> PipelineArtifact {
        PipelineArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            features_raw: FEATURES_RAW.iter().map(|f| f.to_string()).collect(),
            imputer: ImputerParams {
                strategy: IMPUTE_STRATEGY.to_string(),
                statistics: self.encoder.imputer().medians().to_vec(),
            },
            categories: CategoryVocabularies::current(),
            classifier: ClassifierParams {
                kind: CLASSIFIER_KIND.to_string(),
                coefficients: self.classifier.coefficients().to_vec(),
                intercept: self.classifier.intercept(),
                threshold: self.threshold,
            },
        }
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn classifier(&self) -> &LogisticModel {
        &self.classifier
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn predict_encoded(
        &self,
        x: &EncodedRow,
    ) -> std::result::Result<PredictionResponse, InferenceError> {
        if let Some(index) = x.iter().position(|v| !v.is_finite()) {
            return Err(InferenceError::NonFiniteFeature { index });
        }
        let probability = self.classifier.predict_proba(x)?;
        Ok(PredictionResponse {
            prediction: u8::from(probability >= self.threshold),
            probability,
        })
    }
}

fn artifact_error(location: &str, reason: String) -> AppError {
    AppError::ArtifactError {
        path: location.to_string(),
        reason,
    }
}

impl Predictor for InferencePipeline {
    fn predict(&self, row: &FeatureRow) -> std::result::Result<PredictionResponse, InferenceError> {
        let encoded = self.encoder.encode(&RawFeatures::from(row));
        self.predict_encoded(&encoded)
    }

    fn readiness(&self) -> std::result::Result<(), String> {
        if !self.classifier.is_fitted() {
            return Err("classifier has no usable fitted coefficients".to_string());
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(format!("decision threshold {} is outside (0, 1)", self.threshold));
        }
        Ok(())
    }
}
