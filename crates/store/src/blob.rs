use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{BlobStore, PersistenceError};

/// `<uuid>-<file name>`, with path separators and whitespace replaced.
pub(crate) fn blob_key(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let clean: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    let clean = if clean.is_empty() { "blob".to_string() } else { clean };
    format!("{}-{}", Uuid::new_v4(), clean)
}

fn join_url(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key)
}

/// Writes blobs into a local directory served under `base_url`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    dir: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into(),
        }
    }
}

impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        bytes: &[u8],
        name: &str,
        content_type: &str,
    ) -> Result<String, PersistenceError> {
        let key = blob_key(name);
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&key), bytes).await?;
        tracing::debug!("stored blob {} ({}, {} bytes)", key, content_type, bytes.len());
        Ok(join_url(&self.base_url, &key))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryBlob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Keeps uploads in memory. Can be switched to reject uploads.
#[derive(Debug)]
pub struct MemoryBlobStore {
    base_url: String,
    blobs: Mutex<BTreeMap<String, MemoryBlob>>,
    rejecting: AtomicBool,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            blobs: Mutex::new(BTreeMap::new()),
            rejecting: AtomicBool::new(false),
        }
    }

    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::Relaxed);
    }

    pub async fn blob_count(&self) -> usize {
        self.blobs.lock().await.len()
    }

    pub async fn get(&self, url: &str) -> Option<MemoryBlob> {
        let key = url.rsplit('/').next()?;
        self.blobs.lock().await.get(key).cloned()
    }
}

impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        bytes: &[u8],
        name: &str,
        content_type: &str,
    ) -> Result<String, PersistenceError> {
        if self.rejecting.load(Ordering::Relaxed) {
            return Err(PersistenceError::StorageFailure(format!(
                "upload of {name} rejected"
            )));
        }
        let key = blob_key(name);
        self.blobs.lock().await.insert(
            key.clone(),
            MemoryBlob {
                content_type: content_type.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        Ok(join_url(&self.base_url, &key))
    }
}
