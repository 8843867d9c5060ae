use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CacheError;
use crate::models::Response;

use super::{CacheStorage, CachedEntry};

/// Ordered list of namespace names
const CACHES_FILE: &str = "caches.json";

/// Per-namespace entry metadata
const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    status: u16,
    status_text: String,
    headers: Vec<(String, String)>,
    url: Option<String>,
    cached_at: DateTime<Utc>,
    body_file: String,
}

type Index = BTreeMap<String, EntryMeta>;

/// Cache storage under a directory:
///
/// ```text
/// <root>/caches.json
/// <root>/<namespace>/index.json
/// <root>/<namespace>/<sha256(key)>.body
/// ```
pub struct DiskCacheStorage {
    root: PathBuf,
    // Serializes read-modify-write of the JSON files
    write_lock: Mutex<()>,
}

impl DiskCacheStorage {
    pub fn new(root: PathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a namespace. Names are used verbatim, so anything that
    /// is not a plain file name is rejected.
    fn namespace_dir(&self, name: &str) -> Result<PathBuf, CacheError> {
        let plain = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !plain || name.chars().all(|c| c == '.') {
            return Err(CacheError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn body_file(key: &str) -> String {
        format!("{}.body", hex::encode(Sha256::digest(key.as_bytes())))
    }

    async fn read_names(&self) -> Result<Vec<String>, CacheError> {
        Ok(read_json(&self.root.join(CACHES_FILE)).await?.unwrap_or_default())
    }

    async fn read_index(&self, name: &str) -> Result<Index, CacheError> {
        Ok(read_json(&self.namespace_dir(name)?.join(INDEX_FILE))
            .await?
            .unwrap_or_default())
    }

    /// Caller must hold `write_lock`.
    async fn open_locked(&self, name: &str) -> Result<(), CacheError> {
        let dir = self.namespace_dir(name)?;
        let mut names = self.read_names().await?;
        if names.iter().any(|n| n == name) {
            return Ok(());
        }
        // Drop leftovers from an interrupted delete
        remove_dir(&dir).await?;
        tokio::fs::create_dir_all(&dir).await?;
        names.push(name.to_string());
        write_json(&self.root.join(CACHES_FILE), &names).await?;
        debug!(cache = name, "Cache namespace created");
        Ok(())
    }

    async fn load_entry(
        &self,
        name: &str,
        key: &str,
        meta: EntryMeta,
    ) -> Result<Option<CachedEntry>, CacheError> {
        let body_path = self.namespace_dir(name)?.join(&meta.body_file);
        let body = match tokio::fs::read(&body_path).await {
            Ok(body) => body,
            // Index points at a body that is gone; treat as a miss
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(CachedEntry {
            key: key.to_string(),
            response: Response {
                status: meta.status,
                status_text: meta.status_text,
                headers: meta.headers,
                body,
                url: meta.url,
            },
            cached_at: meta.cached_at,
        }))
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CacheError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn remove_dir(dir: &Path) -> Result<(), CacheError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Write through a temp file so readers never see a partial file.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let contents = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.open_locked(name).await
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.read_names().await?.iter().any(|n| n == name))
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        self.read_names().await
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let _guard = self.write_lock.lock().await;
        let mut names = self.read_names().await?;
        let before = names.len();
        names.retain(|n| n != name);
        if names.len() == before {
            return Ok(false);
        }
        // Contents before the listing: a listed name never points at stale data
        remove_dir(&self.namespace_dir(name)?).await?;
        write_json(&self.root.join(CACHES_FILE), &names).await?;
        debug!(cache = name, "Cache namespace deleted");
        Ok(true)
    }

    async fn put(&self, name: &str, key: &str, response: &Response) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.open_locked(name).await?;

        let dir = self.namespace_dir(name)?;
        let body_file = Self::body_file(key);
        tokio::fs::write(dir.join(&body_file), &response.body).await?;

        let mut index = self.read_index(name).await?;
        index.insert(
            key.to_string(),
            EntryMeta {
                status: response.status,
                status_text: response.status_text.clone(),
                headers: response.headers.clone(),
                url: response.url.clone(),
                cached_at: Utc::now(),
                body_file,
            },
        );
        write_json(&dir.join(INDEX_FILE), &index).await
    }

    async fn match_in(&self, name: &str, key: &str) -> Result<Option<CachedEntry>, CacheError> {
        let mut index = self.read_index(name).await?;
        match index.remove(key) {
            Some(meta) => self.load_entry(name, key, meta).await,
            None => Ok(None),
        }
    }

    async fn entries(&self, name: &str) -> Result<Vec<CachedEntry>, CacheError> {
        let index = self.read_index(name).await?;
        let mut entries = Vec::with_capacity(index.len());
        for (key, meta) in index {
            if let Some(entry) = self.load_entry(name, &key, meta).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}
