// Remedy cache: narrow key→document store with best-effort semantics.
//
// The resolver only ever sees `get`/`put`; a missing entry and a failed
// write are both non-events from its perspective. The provided store keeps
// an LRU-bounded map in memory, loads its JSON document file once at
// startup, and persists on a debounced background task so `put` never
// touches the disk on the request path.

use lru::LruCache;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::core::errors::{CacheError, CacheResult};
use crate::core::types::{CacheDocument, CacheKey};
use crate::utils::Metrics;

/// Narrow contract the resolver depends on. No transactional semantics, no
/// TTL logic; any expiry policy belongs to the store itself.
pub trait RemedyStore: Send + Sync + 'static {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheDocument>>;
    fn put(&self, key: &CacheKey, document: &CacheDocument) -> CacheResult<()>;
}

/// JSON-file-backed remedy store with an in-memory LRU front.
#[derive(Clone)]
pub struct JsonFileStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    cache: RwLock<LruCache<String, CacheDocument>>,
    cache_file: PathBuf,
    dirty: RwLock<bool>,
    metrics: Option<Metrics>,
}

impl JsonFileStore {
    /// Open the store, loading any existing document file.
    ///
    /// # Arguments
    /// * `cache_dir` - Directory holding the document file
    /// * `max_entries` - LRU capacity before eviction
    /// * `save_interval` - Debounce interval for disk persistence (None or
    ///   zero disables the background task; `save` can still be called)
    /// * `metrics` - Optional metrics collector
    pub async fn open(
        cache_dir: &str,
        max_entries: usize,
        save_interval: Option<Duration>,
        metrics: Option<Metrics>,
    ) -> CacheResult<Self> {
        let cache_path = Path::new(cache_dir);
        if !cache_path.exists() {
            tokio::fs::create_dir_all(cache_path)
                .await
                .map_err(CacheError::DirectoryCreationFailed)?;
        }

        let cache_file = cache_path.join("remedies.json");

        // A corrupt or unreadable file is logged and replaced by an empty
        // cache; the store never blocks startup.
        let documents: HashMap<String, CacheDocument> = if cache_file.exists() {
            match tokio::fs::read_to_string(&cache_file).await {
                Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                    warn!("Discarding unreadable remedy cache file: {}", e);
                    HashMap::new()
                }),
                Err(e) => {
                    warn!("Failed to read remedy cache file: {}", e);
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        let capacity = NonZeroUsize::new(max_entries.max(1)).expect("capacity is at least 1");
        let mut lru = LruCache::new(capacity);
        for (k, v) in documents {
            lru.put(k, v);
        }

        if let Some(ref m) = metrics {
            m.update_cache_size(lru.len());
        }

        let store = Self {
            inner: Arc::new(StoreInner {
                cache: RwLock::new(lru),
                cache_file,
                dirty: RwLock::new(false),
                metrics,
            }),
        };

        if let Some(interval) = save_interval {
            if interval.as_secs() > 0 {
                store.start_persistence_task(interval);
            }
        }

        Ok(store)
    }

    /// Flush the current contents to disk.
    pub async fn save(&self) -> CacheResult<()> {
        let documents: HashMap<String, CacheDocument> = {
            let cache = self.inner.cache.read();
            cache.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let json = serde_json::to_string_pretty(&documents)?;
        tokio::fs::write(&self.inner.cache_file, json)
            .await
            .map_err(|source| CacheError::SaveFailed {
                path: self.inner.cache_file.display().to_string(),
                source,
            })?;

        *self.inner.dirty.write() = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn start_persistence_task(&self, interval: Duration) {
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let mut last_save = Instant::now();

            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;

                let should_save = *inner.dirty.read() && last_save.elapsed() >= interval;
                if !should_save {
                    continue;
                }

                let documents: HashMap<String, CacheDocument> = {
                    let cache = inner.cache.read();
                    cache.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
                };

                match serde_json::to_string_pretty(&documents) {
                    Ok(json) => {
                        if let Err(e) = tokio::fs::write(&inner.cache_file, json).await {
                            warn!("Deferred remedy cache save failed: {}", e);
                        } else {
                            *inner.dirty.write() = false;
                            last_save = Instant::now();
                        }
                    }
                    Err(e) => warn!("Remedy cache serialization failed: {}", e),
                }
            }
        });
    }
}

impl RemedyStore for JsonFileStore {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheDocument>> {
        let mut cache = self.inner.cache.write();
        let document = cache.get(key.as_str()).cloned();

        if let Some(ref m) = self.inner.metrics {
            match document {
                Some(_) => m.record_cache_hit(),
                None => m.record_cache_miss(),
            }
        }

        Ok(document)
    }

    fn put(&self, key: &CacheKey, document: &CacheDocument) -> CacheResult<()> {
        {
            let mut cache = self.inner.cache.write();
            cache.put(key.as_str().to_string(), document.clone());

            if let Some(ref m) = self.inner.metrics {
                m.update_cache_size(cache.len());
            }
        }

        *self.inner.dirty.write() = true;
        debug!("Cached remedy for {}", key);
        Ok(())
    }
}
