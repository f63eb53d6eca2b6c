// src/store.rs
//! Key-addressed document store for preference state and output batches.
//!
//! Versions are opaque strings (SHA-256 of the content for the built-in stores).
//! `put` with `expected_version = None` creates; with `Some(v)` it updates only if the
//! current version is still `v`.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {path}")]
    NotFound { path: String },

    #[error("version conflict on {path}: expected {expected:?}, found {found:?}")]
    VersionConflict {
        path: String,
        expected: Option<String>,
        found: Option<String>,
    },

    #[error("invalid document path: {0}")]
    InvalidPath(String),

    #[error("corrupt document {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub version: String,
}

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Document, StoreError>;

    /// Create (`expected_version = None`) or update-if-unchanged. Returns the new version.
    async fn put(
        &self,
        path: &str,
        content: &str,
        message: &str,
        expected_version: Option<&str>,
    ) -> Result<String, StoreError>;
}

/// Get-then-put: update when the document exists, create otherwise.
pub async fn upsert(
    store: &dyn DocumentStore,
    path: &str,
    content: &str,
    message: &str,
) -> Result<String, StoreError> {
    let current = match store.get(path).await {
        Ok(doc) => Some(doc.version),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e),
    };
    store.put(path, content, message, current.as_deref()).await
}

/// Read and deserialize a JSON document; a missing document yields `T::default()`.
pub async fn load_json_or_default<T>(store: &dyn DocumentStore, path: &str) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    match store.get(path).await {
        Ok(doc) => serde_json::from_str(&doc.content).map_err(|e| StoreError::Corrupt {
            path: path.to_string(),
            reason: e.to_string(),
        }),
        Err(e) if e.is_not_found() => Ok(T::default()),
        Err(e) => Err(e),
    }
}

pub fn content_version(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Relative, forward-slash key without `..`.
fn validate_path(path: &str) -> Result<&str, StoreError> {
    let p = path.trim();
    if p.is_empty() || p.starts_with('/') || p.contains('\\') {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    let ok = Path::new(p)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !ok {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(p)
}

fn check_version(
    path: &str,
    expected: Option<&str>,
    found: Option<&str>,
) -> Result<(), StoreError> {
    if expected == found {
        return Ok(());
    }
    Err(StoreError::VersionConflict {
        path: path.to_string(),
        expected: expected.map(str::to_string),
        found: found.map(str::to_string),
    })
}

/// Directory-backed store. Writes go to a temp file and are renamed into place.
pub struct FsStore {
    root: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn full_path(&self, path: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(validate_path(path)?))
    }

    async fn read_current(&self, path: &str) -> Result<Option<Document>, StoreError> {
        let full = self.full_path(path)?;
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => {
                let version = content_version(&content);
                Ok(Some(Document { content, version }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for FsStore {
    async fn get(&self, path: &str) -> Result<Document, StoreError> {
        self.read_current(path)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }

    async fn put(
        &self,
        path: &str,
        content: &str,
        message: &str,
        expected_version: Option<&str>,
    ) -> Result<String, StoreError> {
        let _guard = self.write_lock.lock().await;
        let full = self.full_path(path)?;
        let current = self.read_current(path).await?;
        check_version(path, expected_version, current.as_ref().map(|d| d.version.as_str()))?;

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = full.with_extension("tmp");
        tokio::fs::write(&tmp, content.as_bytes()).await?;
        tokio::fs::rename(&tmp, &full).await?;

        tracing::info!(target: "store", path, message, "document written");
        Ok(content_version(content))
    }
}

/// In-memory store; records every commit message.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, String>>,
    messages: Mutex<Vec<(String, String)>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(path, message)` for each successful put, oldest first.
    pub fn messages(&self) -> Vec<(String, String)> {
        lock(&self.messages).clone()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.docs).keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Document, StoreError> {
        let p = validate_path(path)?;
        lock(&self.docs)
            .get(p)
            .map(|content| Document {
                content: content.clone(),
                version: content_version(content),
            })
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }

    async fn put(
        &self,
        path: &str,
        content: &str,
        message: &str,
        expected_version: Option<&str>,
    ) -> Result<String, StoreError> {
        let p = validate_path(path)?;
        let mut docs = lock(&self.docs);
        let found = docs.get(p).map(|c| content_version(c));
        check_version(p, expected_version, found.as_deref())?;
        docs.insert(p.to_string(), content.to_string());
        lock(&self.messages).push((p.to_string(), message.to_string()));
        Ok(content_version(content))
    }
}
