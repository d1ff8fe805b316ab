use crate::domain::ports::DatasetSource;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Public copy of the Titanic passenger list used when no local CSV exists.
pub const REFERENCE_DATASET_URL: &str =
    "https://raw.githubusercontent.com/mwaskom/seaborn-data/master/titanic.csv";

#[derive(Debug, Clone)]
pub struct LocalCsvDataset {
    path: PathBuf,
    location: String,
}

impl LocalCsvDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let location = path.display().to_string();
        Self { path, location }
    }
}

#[async_trait]
impl DatasetSource for LocalCsvDataset {
    async fn fetch(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }

    fn location(&self) -> &str {
        &self.location
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    url: String,
    client: Client,
}

impl ReferenceDataset {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl DatasetSource for ReferenceDataset {
    async fn fetch(&self) -> Result<Vec<u8>> {
        tracing::debug!("Downloading reference dataset from {}", self.url);
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::TrainingDataError {
                message: format!(
                    "reference dataset at {} is unavailable (HTTP {})",
                    self.url, status
                ),
            });
        }
        let body = response.bytes().await?;
        tracing::debug!("Downloaded {} bytes", body.len());
        Ok(body.to_vec())
    }

    fn location(&self) -> &str {
        &self.url
    }
}

/// The local CSV when it exists, otherwise the reference download.
pub fn resolve_dataset(
    data_path: &str,
    fallback_url: &str,
    timeout: Duration,
) -> Result<Box<dyn DatasetSource>> {
    if Path::new(data_path).is_file() {
        return Ok(Box::new(LocalCsvDataset::new(data_path)));
    }
    tracing::warn!(
        "⚠️ {} not found, falling back to reference dataset {}",
        data_path,
        fallback_url
    );
    Ok(Box::new(ReferenceDataset::new(fallback_url, timeout)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_resolve_prefers_existing_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"survived\n1\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let source = resolve_dataset(&path, "http://127.0.0.1:9/unused.csv", Duration::from_secs(1))
            .unwrap();
        assert_eq!(source.location(), path);
        assert_eq!(source.fetch().await.unwrap(), b"survived\n1\n");
    }

    #[tokio::test]
    async fn test_reference_dataset_downloads_csv() {
        let server = MockServer::start();
        let csv_mock = server.mock(|when, then| {
            when.method(GET).path("/titanic.csv");
            then.status(200)
                .header("Content-Type", "text/csv")
                .body("survived,pclass\n1,1\n");
        });

        let source =
            resolve_dataset("does/not/exist.csv", &server.url("/titanic.csv"), Duration::from_secs(5))
                .unwrap();
        let body = source.fetch().await.unwrap();

        csv_mock.assert();
        assert_eq!(body, b"survived,pclass\n1,1\n");
    }

    #[tokio::test]
    async fn test_reference_dataset_reports_http_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/titanic.csv");
            then.status(404);
        });

        let source =
            ReferenceDataset::new(server.url("/titanic.csv"), Duration::from_secs(5)).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, AppError::TrainingDataError { .. }));
        assert!(err.to_string().contains("404"));
    }
}
