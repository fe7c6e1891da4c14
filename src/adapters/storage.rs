use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// 絕對路徑直接使用，相對路徑接在 base_path 之後
    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            Path::new(&self.base_path).join(candidate)
        }
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path);
        tracing::debug!("Reading {}", full_path.display());
        Ok(tokio::fs::read(full_path).await?)
    }

    async fn create_file(&self, path: &str, data: &[u8]) -> Result<bool> {
        let full_path = self.resolve(path);
        Self::ensure_parent(&full_path).await?;

        // 先寫暫存檔再 hard link，其他寫入者看不到只寫了一半的檔案
        let mut temp_name = full_path.clone().into_os_string();
        temp_name.push(format!(
            ".{}.{}.tmp",
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let temp_path = PathBuf::from(temp_name);
        tokio::fs::write(&temp_path, data).await?;

        let linked = tokio::fs::hard_link(&temp_path, &full_path).await;
        let _ = tokio::fs::remove_file(&temp_path).await;

        match linked {
            Ok(()) => {
                tracing::debug!("Created {} ({} bytes)", full_path.display(), data.len());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn append_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);
        Self::ensure_parent(&full_path).await?;

        tracing::debug!("Appending {} bytes to {}", data.len(), full_path.display());
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&full_path)
            .await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_then_append_relative_path() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap());

        assert!(storage.create_file("nested/out.csv", b"a,b\n").await.unwrap());
        storage.append_file("nested/out.csv", b"1,2\n").await.unwrap();
        let data = storage.read_file("nested/out.csv").await.unwrap();

        assert_eq!(data, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_create_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("out.csv"), b"kept\n").unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap());

        assert!(!storage.create_file("out.csv", b"replaced\n").await.unwrap());
        assert_eq!(std::fs::read(dir.path().join("out.csv")).unwrap(), b"kept\n");

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_absolute_path_ignores_base() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("input.csv");
        std::fs::write(&file, b"x\n1\n").unwrap();

        let storage = LocalStorage::new("/does/not/matter");
        let data = storage.read_file(file.to_str().unwrap()).await.unwrap();
        assert_eq!(data, b"x\n1\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap());
        let err = storage.read_file("missing.csv").await.unwrap_err();
        assert!(matches!(err, crate::utils::error::EtlError::IoError(_)));
    }
}
