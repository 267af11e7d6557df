use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{JsonDirStore, LocalBlobStore, PersistenceError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Root of the `fabrics/` and `projects/` document directories.
    pub data_dir: PathBuf,
    pub blob_dir: PathBuf,
    /// Prefix for uploaded texture URLs.
    pub blob_base_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("loom-data"),
            blob_dir: PathBuf::from("loom-data/blobs"),
            blob_base_url: "file://loom-data/blobs".to_string(),
        }
    }
}

impl StoreConfig {
    /// Places documents and blobs under one root directory.
    pub fn rooted_at(root: &Path) -> Self {
        let blob_dir = root.join("blobs");
        Self {
            data_dir: root.to_path_buf(),
            blob_base_url: format!("file://{}", blob_dir.display()),
            blob_dir,
        }
    }

    /// Reads a config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        match std::fs::read(path) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn open(&self) -> (JsonDirStore, LocalBlobStore) {
        (
            JsonDirStore::new(&self.data_dir),
            LocalBlobStore::new(&self.blob_dir, self.blob_base_url.clone()),
        )
    }
}
