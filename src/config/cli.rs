use crate::core::Storage;
use crate::utils::error::Result;
use std::fs;
use std::path::Path;

/// Writes report files under a local directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    pub fn path_of(&self, file: &str) -> String {
        Path::new(&self.base_path).join(file).display().to_string()
    }
}

impl Storage for LocalStorage {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(&self.base_path).join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_file_creates_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("reports/run-1");
        let storage = LocalStorage::new(base.display().to_string());

        storage.write_file("failures.csv", b"type,name\n").await.unwrap();

        let written = fs::read_to_string(base.join("failures.csv")).unwrap();
        assert_eq!(written, "type,name\n");
        assert!(storage.path_of("failures.csv").ends_with("failures.csv"));
    }
}
