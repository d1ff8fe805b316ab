use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// Files under a base directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Storage rooted at the parent of `file`, plus the bare file name.
    /// `model/pipeline.json` becomes (`model`, `pipeline.json`).
    pub fn for_file(file: &str) -> (Self, String) {
        let path = Path::new(file);
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string());
        (Self::new(parent), name)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    fn locate(&self, path: &str) -> String {
        self.base_path.join(path).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_for_file_splits_directory() {
        let (storage, name) = LocalStorage::for_file("model/pipeline.json");
        assert_eq!(storage.base_path(), Path::new("model"));
        assert_eq!(name, "pipeline.json");

        let (storage, name) = LocalStorage::for_file("pipeline.json");
        assert_eq!(storage.base_path(), Path::new("."));
        assert_eq!(name, "pipeline.json");
    }

    #[tokio::test]
    async fn test_write_creates_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().join("model"));

        storage.write_file("meta.json", b"{}").await.unwrap();
        assert_eq!(storage.read_file("meta.json").await.unwrap(), b"{}");
        assert!(storage.locate("meta.json").ends_with("meta.json"));
    }

    #[tokio::test]
    async fn test_read_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        assert!(storage.read_file("absent.json").await.is_err());
    }
}
