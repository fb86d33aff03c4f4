//! Filesystem object store
//!
//! Each key maps to a file below the store root. Object metadata lives in a
//! JSON sidecar under [`META_DIR`] so that object files hold exactly the
//! stored bytes. Writes go to a temporary file that is then renamed over the
//! destination, so readers never observe a partially written object. Directory
//! walks and temporary file writes run on the blocking thread pool.

use crate::error::{StoreError, StoreResult};
use crate::stats::StoreStatistics;
use crate::traits::{BlobStore, Metadata, ObjectMeta, check_range, validate_key};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use std::io::Write;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Directory below the root holding metadata sidecars.
pub const META_DIR: &str = ".ripple-meta";

const TEMP_EXTENSION: &str = "ripple-tmp";

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    #[serde(default)]
    metadata: Metadata,
}

/// [`BlobStore`] rooted at a local directory.
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
    stats: Arc<StoreStatistics>,
}

impl DiskStore {
    /// Open (creating if needed) a store at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(META_DIR)).await?;
        debug!("Opened disk store at {}", root.display());
        Ok(Self {
            root,
            stats: Arc::new(StoreStatistics::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stats(&self) -> &Arc<StoreStatistics> {
        &self.stats
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.root.join(META_DIR).join(format!("{key}.json"))
    }

    async fn read_meta(&self, key: &str, path: &Path) -> StoreResult<ObjectMeta> {
        let file_meta = fs::metadata(path).await.map_err(|e| not_found(key, e))?;
        if !file_meta.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        let metadata = match fs::read(self.sidecar_path(key)).await {
            Ok(raw) => serde_json::from_slice::<Sidecar>(&raw)?.metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Metadata::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(ObjectMeta {
            key: key.to_string(),
            content_length: file_meta.len(),
            metadata,
            last_modified: file_meta.modified()?,
        })
    }

    /// Write through a uniquely named temporary file in the destination
    /// directory, then rename it into place. Concurrent writers of the same
    /// key each get their own temporary file; the last rename wins.
    async fn write_atomic(path: &Path, data: Bytes) -> StoreResult<()> {
        let Some(parent) = path.parent().map(Path::to_path_buf) else {
            return Err(StoreError::InvalidKey(path.display().to_string()));
        };
        fs::create_dir_all(&parent).await?;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut temp = tempfile::Builder::new()
                .prefix(".")
                .suffix(&format!(".{TEMP_EXTENSION}"))
                .tempfile_in(&parent)?;
            temp.write_all(&data)?;
            temp.as_file().sync_all()?;
            temp.persist(&path)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Other(format!("write task failed: {e}")))??;
        Ok(())
    }

    /// Walk the store tree and return `(key, path)` for every object file
    /// whose key starts with `prefix`.
    fn scan(root: &Path, prefix: &str) -> Vec<(String, PathBuf)> {
        let mut found = Vec::new();
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || e.file_name() != META_DIR)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable path during listing: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file()
                || entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == TEMP_EXTENSION)
            {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                found.push((key, entry.into_path()));
            }
        }
        found
    }
}

fn not_found(key: &str, e: std::io::Error) -> StoreError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Io(e)
    }
}

#[async_trait]
impl BlobStore for DiskStore {
    async fn head(&self, key: &str) -> StoreResult<ObjectMeta> {
        validate_key(key)?;
        let meta = self.read_meta(key, &self.object_path(key)).await?;
        self.stats.record_read(0);
        Ok(meta)
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> StoreResult<Bytes> {
        validate_key(key)?;
        let path = self.object_path(key);
        let mut file = fs::File::open(&path).await.map_err(|e| not_found(key, e))?;
        let length = file.metadata().await?.len();
        check_range(key, start, end, length)?;

        let mut buffer = vec![0u8; (end - start + 1) as usize];
        file.seek(SeekFrom::Start(start)).await?;
        file.read_exact(&mut buffer).await?;
        self.stats.record_read(buffer.len() as u64);
        trace!("Read {} bytes from {} [{}, {}]", buffer.len(), key, start, end);
        Ok(Bytes::from(buffer))
    }

    async fn get_content(&self, key: &str) -> StoreResult<Bytes> {
        validate_key(key)?;
        let data = fs::read(self.object_path(key))
            .await
            .map_err(|e| not_found(key, e))?;
        self.stats.record_read(data.len() as u64);
        Ok(Bytes::from(data))
    }

    async fn put(&self, key: &str, content: Bytes, metadata: Metadata) -> StoreResult<()> {
        validate_key(key)?;
        // Sidecar first: an object file is only visible once its metadata exists.
        let sidecar = serde_json::to_vec(&Sidecar { metadata })?;
        let length = content.len();
        Self::write_atomic(&self.sidecar_path(key), Bytes::from(sidecar)).await?;
        Self::write_atomic(&self.object_path(key), content).await?;
        self.stats.record_write(length as u64);
        trace!("Wrote {} bytes to {}", length, key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        self.stats.record_list();
        let root = self.root.clone();
        let owned_prefix = prefix.to_string();
        let found = tokio::task::spawn_blocking(move || Self::scan(&root, &owned_prefix))
            .await
            .map_err(|e| StoreError::Other(format!("listing task failed: {e}")))?;

        let mut listed = Vec::with_capacity(found.len());
        for (key, path) in found {
            match self.read_meta(&key, &path).await {
                Ok(meta) => listed.push(meta),
                // Renamed away between walk and stat
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }
}
