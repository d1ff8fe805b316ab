//! On-disk form of the fitted pipeline (`pipeline.json`) and its companion
//! metadata record (`meta.json`).

use crate::domain::model::{Port, Sex, Vocabulary, ENCODED_WIDTH, FEATURES_RAW, NUMERIC_WIDTH};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;
pub const IMPUTE_STRATEGY: &str = "median";
pub const CLASSIFIER_KIND: &str = "logistic_regression";
pub const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryVocabularies {
    pub sex: Vec<String>,
    pub embarked: Vec<String>,
}

impl CategoryVocabularies {
    /// The vocabularies compiled into this binary.
    pub fn current() -> Self {
        Self {
            sex: labels::<Sex>(),
            embarked: labels::<Port>(),
        }
    }
}

fn labels<V: Vocabulary>() -> Vec<String> {
    V::LABELS.iter().map(|label| label.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputerParams {
    pub strategy: String,
    /// One fill value per numeric feature.
    pub statistics: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    pub kind: String,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub format_version: u32,
    pub features_raw: Vec<String>,
    pub imputer: ImputerParams,
    pub categories: CategoryVocabularies,
    pub classifier: ClassifierParams,
}

impl PipelineArtifact {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Structural compatibility with this build's feature encoding.
    pub fn check_compatibility(&self) -> Result<(), String> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(format!(
                "unsupported format_version {} (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            ));
        }

        if self.features_raw != FEATURES_RAW {
            return Err(format!(
                "feature list {:?} does not match {:?}",
                self.features_raw, FEATURES_RAW
            ));
        }

        if self.categories != CategoryVocabularies::current() {
            return Err(format!(
                "category vocabularies {:?} do not match {:?}",
                self.categories,
                CategoryVocabularies::current()
            ));
        }

        if self.imputer.strategy != IMPUTE_STRATEGY {
            return Err(format!("unsupported imputer strategy '{}'", self.imputer.strategy));
        }
        if self.imputer.statistics.len() != NUMERIC_WIDTH {
            return Err(format!(
                "imputer has {} statistics, expected {}",
                self.imputer.statistics.len(),
                NUMERIC_WIDTH
            ));
        }
        if self.imputer.statistics.iter().any(|v| !v.is_finite()) {
            return Err("imputer statistics must be finite".to_string());
        }

        if self.classifier.kind != CLASSIFIER_KIND {
            return Err(format!("unsupported classifier '{}'", self.classifier.kind));
        }
        if self.classifier.coefficients.len() != ENCODED_WIDTH {
            return Err(format!(
                "classifier has {} coefficients, expected {}",
                self.classifier.coefficients.len(),
                ENCODED_WIDTH
            ));
        }
        if self.classifier.coefficients.iter().any(|v| !v.is_finite())
            || !self.classifier.intercept.is_finite()
        {
            return Err("classifier weights must be finite".to_string());
        }
        if !(self.classifier.threshold > 0.0 && self.classifier.threshold < 1.0) {
            return Err(format!(
                "decision threshold {} is outside (0, 1)",
                self.classifier.threshold
            ));
        }

        Ok(())
    }
}

/// Written next to the artifact for inspection; never read by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub features_raw: Vec<String>,
    pub categories: CategoryVocabularies,
    pub format_version: u32,
    pub trained_at: DateTime<Utc>,
    pub dataset: String,
    pub n_samples: usize,
    pub training_accuracy: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> PipelineArtifact {
        PipelineArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            features_raw: FEATURES_RAW.iter().map(|f| f.to_string()).collect(),
            imputer: ImputerParams {
                strategy: IMPUTE_STRATEGY.to_string(),
                statistics: vec![3.0, 28.0, 14.45, 1.0],
            },
            categories: CategoryVocabularies::current(),
            classifier: ClassifierParams {
                kind: CLASSIFIER_KIND.to_string(),
                coefficients: vec![0.1; ENCODED_WIDTH],
                intercept: -0.2,
                threshold: DEFAULT_THRESHOLD,
            },
        }
    }

    #[test]
    fn test_compatible_artifact_passes() {
        assert!(artifact().check_compatibility().is_ok());
    }

    #[test]
    fn test_rejects_future_version() {
        let mut a = artifact();
        a.format_version = 2;
        assert!(a.check_compatibility().unwrap_err().contains("format_version"));
    }

    #[test]
    fn test_rejects_reordered_vocabulary() {
        let mut a = artifact();
        a.categories.embarked = vec!["S".into(), "C".into(), "Q".into()];
        assert!(a.check_compatibility().is_err());
    }

    #[test]
    fn test_rejects_wrong_coefficient_width() {
        let mut a = artifact();
        a.classifier.coefficients.pop();
        assert!(a.check_compatibility().unwrap_err().contains("coefficients"));
    }

    #[test]
    fn test_json_document_is_readable_back() {
        let a = artifact();
        let json = a.to_json_pretty().unwrap();
        assert!(json.contains("\"features_raw\""));
        assert_eq!(PipelineArtifact::from_slice(json.as_bytes()).unwrap(), a);
    }
}
