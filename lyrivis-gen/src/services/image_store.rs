//! Content-addressed image blob store
//!
//! Image bytes live under `<root>/images/<uuid>.png`; the dedup index in
//! the database maps phrase hashes to these ids.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use lyrivis_common::{Error, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Encode image bytes as an inline data URI for direct client use
pub fn data_uri(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

#[derive(Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root_folder: &Path) -> Self {
        Self {
            root: root_folder.join("images"),
        }
    }

    /// Create the images directory if missing
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{}.png", id))
    }

    pub async fn write(&self, id: Uuid, bytes: &[u8]) -> Result<()> {
        tokio::fs::write(self.path_for(id), bytes).await?;
        Ok(())
    }

    pub async fn read(&self, id: Uuid) -> Result<Vec<u8>> {
        let path = self.path_for(id);
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("Image blob missing: {}", path.display()))
            } else {
                Error::Io(e)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = ImageStore::new(temp.path());
        store.ensure_dir().await.unwrap();

        let id = Uuid::new_v4();
        store.write(id, b"fake png bytes").await.unwrap();
        assert_eq!(store.read(id).await.unwrap(), b"fake png bytes");
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = ImageStore::new(temp.path());
        store.ensure_dir().await.unwrap();

        match store.read(Uuid::new_v4()).await {
            Err(Error::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn data_uri_has_png_prefix() {
        let uri = data_uri(b"abc");
        assert!(uri.starts_with("data:image/png;base64,"));
        let encoded = uri.trim_start_matches("data:image/png;base64,");
        assert_eq!(STANDARD.decode(encoded).unwrap(), b"abc");
    }
}
