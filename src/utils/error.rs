use std::fmt;
use thiserror::Error;

/// Request fields checked by the schema validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationField {
    Pclass,
    Age,
    Fare,
    Sibsp,
    Parch,
    Sex,
    Embarked,
}

impl ValidationField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationField::Pclass => "pclass",
            ValidationField::Age => "age",
            ValidationField::Fare => "fare",
            ValidationField::Sibsp => "sibsp",
            ValidationField::Parch => "parch",
            ValidationField::Sex => "sex",
            ValidationField::Embarked => "embarked",
        }
    }
}

impl fmt::Display for ValidationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request field violated its constraint.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: ValidationField,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: ValidationField, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure while scoring an already validated feature row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("encoded feature {index} is not finite")]
    NonFiniteFeature { index: usize },

    #[error("decision score is not finite")]
    NonFiniteScore,

    #[error("classifier expects {expected} features, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Model artifact error ({path}): {reason}")]
    ArtifactError { path: String, reason: String },

    #[error("Training data error: {message}")]
    TrainingDataError { message: String },

    #[error("Prediction failed: {0}")]
    PredictionFailed(#[from] InferenceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Data,
    Model,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit code used by the binaries.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::ConfigError { .. }
            | AppError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            AppError::HttpError(_) => ErrorCategory::Network,
            AppError::CsvError(_) | AppError::TrainingDataError { .. } => ErrorCategory::Data,
            AppError::ArtifactError { .. }
            | AppError::SerializationError(_)
            | AppError::PredictionFailed(_) => ErrorCategory::Model,
            AppError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::HttpError(_) => ErrorSeverity::Medium,
            AppError::ConfigError { .. }
            | AppError::InvalidConfigValueError { .. }
            | AppError::CsvError(_)
            | AppError::TrainingDataError { .. }
            | AppError::PredictionFailed(_) => ErrorSeverity::High,
            AppError::ArtifactError { .. }
            | AppError::SerializationError(_)
            | AppError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            AppError::ArtifactError { .. } => {
                "Run the `train` binary to produce a fresh artifact, or point MODEL_PATH at an existing one".to_string()
            }
            AppError::TrainingDataError { .. } | AppError::CsvError(_) => {
                "Check that the dataset is a CSV with survived, pclass, age, fare, sibsp, parch, sex and embarked columns".to_string()
            }
            AppError::HttpError(_) => {
                "Check network connectivity and the configured URL, then retry".to_string()
            }
            AppError::ConfigError { .. } | AppError::InvalidConfigValueError { .. } => {
                "Review the command line flags, environment variables and config file".to_string()
            }
            AppError::PredictionFailed(_) => {
                "The loaded model could not score this row; retrain or inspect the artifact".to_string()
            }
            AppError::IoError(_) | AppError::SerializationError(_) => {
                "Check file permissions and available disk space".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AppError::ArtifactError { path, .. } => {
                format!("The model artifact at {} could not be loaded", path)
            }
            AppError::TrainingDataError { message } => format!("Training aborted: {}", message),
            AppError::HttpError(_) => "A remote server could not be reached".to_string(),
            AppError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting for {}: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_field() {
        let err = ValidationError::new(ValidationField::Pclass, "must be 1, 2 or 3");
        assert_eq!(err.to_string(), "pclass: must be 1, 2 or 3");
    }

    #[test]
    fn test_severity_drives_exit_code() {
        let artifact = AppError::ArtifactError {
            path: "model/pipeline.json".to_string(),
            reason: "not found".to_string(),
        };
        assert_eq!(artifact.severity(), ErrorSeverity::Critical);
        assert_eq!(artifact.severity().exit_code(), 3);
        assert_eq!(artifact.category(), ErrorCategory::Model);

        let data = AppError::TrainingDataError {
            message: "missing columns".to_string(),
        };
        assert_eq!(data.severity().exit_code(), 1);
        assert!(data.user_friendly_message().contains("missing columns"));
    }

    #[test]
    fn test_every_failure_exits_nonzero() {
        let errors = [
            AppError::ConfigError {
                message: "bad toml".to_string(),
            },
            AppError::InvalidConfigValueError {
                field: "host".to_string(),
                value: "not a host".to_string(),
                reason: "invalid".to_string(),
            },
            AppError::PredictionFailed(InferenceError::NonFiniteScore),
            AppError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
        ];
        for err in errors {
            assert_ne!(err.severity().exit_code(), 0, "{err}");
            assert!(!err.recovery_suggestion().is_empty());
        }
        assert_eq!(
            AppError::PredictionFailed(InferenceError::NonFiniteScore).category(),
            ErrorCategory::Model
        );
    }
}
