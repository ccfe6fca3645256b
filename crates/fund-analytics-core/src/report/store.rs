//! Storage backends for published report blobs.
//!
//! Keys are slash-separated relative paths such as
//! `peer_ranking/2024/12/peer_ranking_2024-12-31.json`.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::FundAnalyticsError;
use crate::FundAnalyticsResult;

/// Key-value store of JSON documents.
pub trait BlobStore {
    /// Read the document at `key`, or `None` when it does not exist.
    fn read(&self, key: &str) -> FundAnalyticsResult<Option<Value>>;

    /// Write `value` at `key`, replacing any existing document.
    fn write(&mut self, key: &str, value: &Value) -> FundAnalyticsResult<()>;
}

fn check_key(key: &str) -> FundAnalyticsResult<&Path> {
    let path = Path::new(key);
    if key.trim().is_empty() {
        return Err(FundAnalyticsError::StorageError("Empty blob key".into()));
    }
    if path.is_absolute() {
        return Err(FundAnalyticsError::StorageError(format!(
            "Blob key '{}' must be relative",
            key
        )));
    }
    for c in path.components() {
        if !matches!(c, Component::Normal(_) | Component::CurDir) {
            return Err(FundAnalyticsError::StorageError(format!(
                "Blob key '{}' escapes the store root",
                key
            )));
        }
    }
    Ok(path)
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// Blob store rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of `key` under the root.
    pub fn path_for(&self, key: &str) -> FundAnalyticsResult<PathBuf> {
        Ok(self.root.join(check_key(key)?))
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self, key: &str) -> FundAnalyticsResult<Option<Value>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write(&mut self, key: &str, value: &Value) -> FundAnalyticsResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write then rename so readers never see a partial document
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        fs::rename(&tmp, &path)?;
        tracing::info!(path = %path.display(), "blob written");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, Value>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.blobs.keys().map(String::as_str)
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, key: &str) -> FundAnalyticsResult<Option<Value>> {
        check_key(key)?;
        Ok(self.blobs.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &Value) -> FundAnalyticsResult<()> {
        check_key(key)?;
        self.blobs.insert(key.to_string(), value.clone());
        Ok(())
    }
}
