use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use recbridge_protocol::{CACHE_KEY_PREFIX, cache_key, validate_recording_id};

use crate::CacheError;

/// A cached recording binary with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedVideo {
    pub data: Vec<u8>,
    pub mime_type: String,
    /// Size of `data` in bytes.
    pub size: u64,
    /// Epoch milliseconds the entry was written.
    pub cached_at: i64,
}

/// Metadata header persisted in front of the binary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryMeta {
    mime_type: String,
    size: u64,
    cached_at: i64,
}

/// Durable key→binary map rooted at one directory.
///
/// Entry file layout (single file, so one rename commits atomically):
///
/// ```text
/// [4 bytes BE: meta_len][meta_len bytes: meta JSON][raw binary data]
/// ```
///
/// An internal mutex serializes operations; each call is a
/// self-contained transaction and no handle leaks across calls.
/// Concurrent puts on the same id are last-write-wins.
pub struct VideoCache {
    root: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl VideoCache {
    /// Opens (and creates if needed) a cache rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Stores `data` under `recording_id`, overwriting any prior entry.
    pub async fn put(
        &self,
        recording_id: &str,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<(), CacheError> {
        validate_recording_id(recording_id)?;
        let _guard = self.lock.lock().await;

        let meta = EntryMeta {
            mime_type: mime_type.to_string(),
            size: data.len() as u64,
            cached_at: chrono::Utc::now().timestamp_millis(),
        };
        let bytes = encode_entry(&meta, &data)?;

        // Unique temp name so racing puts never collide; the rename
        // decides last-write-wins.
        let key = cache_key(recording_id);
        let tmp = self
            .root
            .join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4()));
        let dest = self.root.join(&key);

        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &dest).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!(recording_id, size = meta.size, mime_type, "cached recording");
        Ok(())
    }

    /// Returns the cached entry, or `None` if absent. Absence is a
    /// normal, retryable outcome.
    pub async fn get(&self, recording_id: &str) -> Result<Option<CachedVideo>, CacheError> {
        validate_recording_id(recording_id)?;
        let _guard = self.lock.lock().await;

        let path = self.root.join(cache_key(recording_id));
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decode_entry(&bytes).map(Some)
    }

    /// Removes the entry for `recording_id`. Deleting a missing entry
    /// is not an error.
    pub async fn delete(&self, recording_id: &str) -> Result<(), CacheError> {
        validate_recording_id(recording_id)?;
        let _guard = self.lock.lock().await;

        let path = self.root.join(cache_key(recording_id));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(recording_id, "cache entry deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes entries older than `max_age_days` and returns the count
    /// deleted. A second immediate call deletes 0.
    pub async fn sweep_expired(&self, max_age_days: u32) -> Result<usize, CacheError> {
        let _guard = self.lock.lock().await;

        let max_age_ms = i64::from(max_age_days) * 86_400_000;
        let now = chrono::Utc::now().timestamp_millis();
        let mut deleted = 0;

        for path in self.entry_paths().await? {
            let meta = match read_meta_header(&path).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable cache entry");
                    continue;
                }
            };
            if now - meta.cached_at > max_age_ms {
                tokio::fs::remove_file(&path).await?;
                deleted += 1;
            }
        }

        info!(deleted, max_age_days, "cache sweep finished");
        Ok(deleted)
    }

    /// Sum of all entries' payload sizes in bytes.
    pub async fn total_size(&self) -> Result<u64, CacheError> {
        let _guard = self.lock.lock().await;

        let mut total = 0;
        for path in self.entry_paths().await? {
            match read_meta_header(&path).await {
                Ok(meta) => total += meta.size,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable cache entry");
                }
            }
        }
        Ok(total)
    }

    /// Recording ids currently cached, in sorted order.
    pub async fn entries(&self) -> Result<Vec<String>, CacheError> {
        let _guard = self.lock.lock().await;

        let mut ids = Vec::new();
        for path in self.entry_paths().await? {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if let Some(id) = name.strip_prefix(CACHE_KEY_PREFIX) {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Paths of all committed entry files (temp files excluded).
    async fn entry_paths(&self) -> Result<Vec<PathBuf>, CacheError> {
        let mut paths = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(CACHE_KEY_PREFIX) {
                paths.push(item.path());
            }
        }
        Ok(paths)
    }
}

fn encode_entry(meta: &EntryMeta, data: &[u8]) -> Result<Vec<u8>, CacheError> {
    let meta_bytes = serde_json::to_vec(meta)?;
    let meta_len = meta_bytes.len() as u32;

    let mut buf = Vec::with_capacity(4 + meta_bytes.len() + data.len());
    buf.extend_from_slice(&meta_len.to_be_bytes());
    buf.extend_from_slice(&meta_bytes);
    buf.extend_from_slice(data);
    Ok(buf)
}

fn decode_entry(bytes: &[u8]) -> Result<CachedVideo, CacheError> {
    if bytes.len() < 4 {
        return Err(CacheError::Corrupt("entry shorter than header".into()));
    }
    let meta_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if bytes.len() < 4 + meta_len {
        return Err(CacheError::Corrupt(format!(
            "meta length {meta_len} exceeds entry size {}",
            bytes.len()
        )));
    }

    let meta: EntryMeta = serde_json::from_slice(&bytes[4..4 + meta_len])
        .map_err(|e| CacheError::Corrupt(format!("bad meta JSON: {e}")))?;
    let data = bytes[4 + meta_len..].to_vec();
    if meta.size != data.len() as u64 {
        return Err(CacheError::Corrupt(format!(
            "meta size {} does not match payload size {}",
            meta.size,
            data.len()
        )));
    }

    Ok(CachedVideo {
        data,
        mime_type: meta.mime_type,
        size: meta.size,
        cached_at: meta.cached_at,
    })
}

/// Reads just the metadata header of an entry file.
async fn read_meta_header(path: &Path) -> Result<EntryMeta, CacheError> {
    let mut file = tokio::fs::File::open(path).await?;

    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf).await?;
    let meta_len = u32::from_be_bytes(len_buf) as usize;

    let mut meta_buf = vec![0u8; meta_len];
    file.read_exact(&mut meta_buf).await?;
    serde_json::from_slice(&meta_buf)
        .map_err(|e| CacheError::Corrupt(format!("bad meta JSON: {e}")))
}
