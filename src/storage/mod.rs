//! Local object store for uploaded site assets.
//!
//! Objects live as plain files under the configured uploads directory and are
//! served back at `/uploads/<name>`. Writes overwrite any existing object of
//! the same name (upsert semantics), which is how the logo keeps a fixed name
//! across replacements.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extensions accepted for logo uploads.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object name: {0}")]
    InvalidName(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Write an object, overwriting any existing one with the same name.
    pub async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_name(name)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(name), bytes).await?;
        Ok(())
    }

    /// Remove an object. Missing objects are not an error.
    pub async fn delete(&self, name: &str) -> Result<(), StorageError> {
        validate_name(name)?;
        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Filesystem path of a stored object, or None if the name is invalid or
    /// nothing is stored under it.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        validate_name(name).ok()?;
        let path = self.root.join(name);
        path.is_file().then_some(path)
    }

    /// Publicly fetchable URL path for a stored object.
    pub fn public_url(&self, name: &str) -> String {
        format!("/uploads/{}", name)
    }
}

/// Object name for the site logo, derived from the uploaded file's name.
/// The base name is fixed so a replacement overwrites the previous logo.
pub fn logo_object_name(filename: &str) -> Result<String, StorageError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| StorageError::UnsupportedType(filename.to_string()))?;

    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(StorageError::UnsupportedType(ext));
    }

    Ok(format!("logo.{}", ext))
}

fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (ObjectStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        (ObjectStore::new(tmp.path().join("uploads")), tmp)
    }

    #[tokio::test]
    async fn put_overwrites_existing_object() {
        let (store, _tmp) = test_store();

        store.put("logo.png", b"old").await.unwrap();
        store.put("logo.png", b"new").await.unwrap();

        let path = store.resolve("logo.png").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (store, _tmp) = test_store();

        store.put("logo.png", b"data").await.unwrap();
        store.delete("logo.png").await.unwrap();
        store.delete("logo.png").await.unwrap();
        assert!(store.resolve("logo.png").is_none());
    }

    #[tokio::test]
    async fn names_with_separators_are_rejected() {
        let (store, _tmp) = test_store();

        assert!(store.put("../escape.png", b"x").await.is_err());
        assert!(store.put("a/b.png", b"x").await.is_err());
        assert!(store.resolve("../../etc/passwd").is_none());
    }

    #[test]
    fn logo_name_is_fixed_per_extension() {
        assert_eq!(logo_object_name("brand.PNG").unwrap(), "logo.png");
        assert_eq!(logo_object_name("new-logo.svg").unwrap(), "logo.svg");
    }

    #[test]
    fn logo_name_rejects_non_images() {
        assert!(logo_object_name("script.sh").is_err());
        assert!(logo_object_name("noextension").is_err());
    }

    #[test]
    fn public_url_is_under_uploads() {
        let (store, _tmp) = test_store();
        assert_eq!(store.public_url("logo.png"), "/uploads/logo.png");
    }
}
