use crate::adapters::REFERENCE_DATASET_URL;
use crate::core::training::{OutputFiles, SolverParams};
use crate::utils::error::{AppError, Result};
use crate::utils::validation::{
    validate_file_name, validate_path, validate_positive_float, validate_range, validate_url,
    Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub data: DataConfig,
    pub output: OutputConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub path: String,
    pub fallback_url: String,
    pub download_timeout_seconds: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: "data/titanic.csv".to_string(),
            fallback_url: REFERENCE_DATASET_URL.to_string(),
            download_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub model_dir: String,
    pub artifact_file: String,
    pub metadata_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let files = OutputFiles::default();
        Self {
            model_dir: "model".to_string(),
            artifact_file: files.artifact,
            metadata_file: files.metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Inverse regularization strength.
    pub c: f64,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let params = SolverParams::default();
        Self {
            c: params.c,
            max_iter: params.max_iter,
            tolerance: params.tolerance,
        }
    }
}

impl TrainingConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        toml::from_str(&processed).map_err(|e| AppError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| AppError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn solver_params(&self) -> SolverParams {
        SolverParams {
            c: self.model.c,
            max_iter: self.model.max_iter,
            tolerance: self.model.tolerance,
        }
    }

    pub fn output_files(&self) -> OutputFiles {
        OutputFiles {
            artifact: self.output.artifact_file.clone(),
            metadata: self.output.metadata_file.clone(),
        }
    }

    pub fn artifact_path(&self) -> String {
        Path::new(&self.output.model_dir)
            .join(&self.output.artifact_file)
            .display()
            .to_string()
    }
}

impl Validate for TrainingConfig {
    fn validate(&self) -> Result<()> {
        validate_path("data.path", &self.data.path)?;
        validate_url("data.fallback_url", &self.data.fallback_url)?;
        validate_range(
            "data.download_timeout_seconds",
            self.data.download_timeout_seconds,
            1,
            3600,
        )?;

        validate_path("output.model_dir", &self.output.model_dir)?;
        validate_file_name("output.artifact_file", &self.output.artifact_file)?;
        validate_file_name("output.metadata_file", &self.output.metadata_file)?;
        if self.output.artifact_file == self.output.metadata_file {
            return Err(AppError::InvalidConfigValueError {
                field: "output.metadata_file".to_string(),
                value: self.output.metadata_file.clone(),
                reason: "must differ from output.artifact_file".to_string(),
            });
        }

        validate_positive_float("model.c", self.model.c)?;
        validate_range("model.max_iter", self.model.max_iter, 1, 10_000)?;
        validate_positive_float("model.tolerance", self.model.tolerance)?;
        Ok(())
    }
}
