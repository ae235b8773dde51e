//! Blob storage for Jotter.
//!
//! Uploaded images and PDFs are stored outside the database under
//! UUID-based names. Notes never touch the blob store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{JotterError, Result};

/// Physical storage for file content.
///
/// Stored names are opaque strings produced by the store itself.
pub trait BlobStore: Send + Sync {
    /// Write content under a fresh name derived from the original filename.
    fn write(&self, content: &[u8], original_name: &str) -> Result<String>;

    /// Read stored content.
    fn read(&self, stored_name: &str) -> Result<Vec<u8>>;

    /// Delete stored content. Returns false if it did not exist.
    fn delete(&self, stored_name: &str) -> Result<bool>;

    /// Copy stored content to a fresh name.
    fn copy(&self, stored_name: &str) -> Result<String>;

    /// Check whether stored content exists.
    fn exists(&self, stored_name: &str) -> bool;
}

/// Filesystem blob store.
///
/// Files are stored in a sharded directory structure:
/// ```text
/// {base_path}/
/// ├── ab/
/// │   └── ab12cd34-5678-90ab-cdef-123456789012.png
/// └── cd/
///     └── cd90ab12-3456-7890-abcd-ef1234567890.pdf
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage with the given base path.
    ///
    /// The base directory will be created if it doesn't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the full file path for a stored name.
    ///
    /// The path is `{base_path}/{shard}/{stored_name}`, where the shard is
    /// the first two characters of the name.
    pub fn get_file_path(&self, stored_name: &str) -> Result<PathBuf> {
        if stored_name.is_empty()
            || stored_name.contains(['/', '\\'])
            || stored_name.starts_with('.')
        {
            return Err(JotterError::Validation(format!(
                "invalid stored name: {stored_name}"
            )));
        }
        let shard = Self::get_shard(stored_name);
        Ok(self.base_path.join(shard).join(stored_name))
    }

    fn get_shard(stored_name: &str) -> &str {
        stored_name.get(..2).unwrap_or(stored_name)
    }

    /// Extract a safe, lowercase extension. Falls back to "bin".
    fn extract_extension(filename: &str) -> String {
        Path::new(filename)
            .extension()
            .and_then(|s| s.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string())
    }

    /// Generate a new UUID-based stored name with the given extension.
    pub fn generate_stored_name(original_name: &str) -> String {
        let ext = Self::extract_extension(original_name);
        format!("{}.{ext}", Uuid::new_v4())
    }

    fn write_with_name(&self, content: &[u8], stored_name: &str) -> Result<()> {
        let file_path = self.get_file_path(stored_name)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file_path, content)?;
        Ok(())
    }

    /// Remove empty shard directories. Returns how many were removed.
    pub fn cleanup_empty_dirs(&self) -> Result<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.base_path)?.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if let Ok(mut dir_entries) = fs::read_dir(&path) {
                    if dir_entries.next().is_none() && fs::remove_dir(&path).is_ok() {
                        removed += 1;
                    }
                }
            }
        }

        Ok(removed)
    }
}

impl BlobStore for FileStorage {
    fn write(&self, content: &[u8], original_name: &str) -> Result<String> {
        let stored_name = Self::generate_stored_name(original_name);
        self.write_with_name(content, &stored_name)?;
        Ok(stored_name)
    }

    fn read(&self, stored_name: &str) -> Result<Vec<u8>> {
        let file_path = self.get_file_path(stored_name)?;

        match fs::read(&file_path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(JotterError::NotFound(format!("blob {stored_name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, stored_name: &str) -> Result<bool> {
        let file_path = self.get_file_path(stored_name)?;

        match fs::remove_file(&file_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn copy(&self, stored_name: &str) -> Result<String> {
        let source = self.get_file_path(stored_name)?;
        if !source.exists() {
            return Err(JotterError::NotFound(format!("blob {stored_name}")));
        }

        let new_name = Self::generate_stored_name(stored_name);
        let target = self.get_file_path(&new_name)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, &target)?;
        Ok(new_name)
    }

    fn exists(&self, stored_name: &str) -> bool {
        self.get_file_path(stored_name)
            .map(|p| p.exists())
            .unwrap_or(false)
    }
}
