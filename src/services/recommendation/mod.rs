// Recommendation resolver: (label, language) → remedy, always.
//
// Three tiers behind one call: cached document, freshly generated text,
// canned fallback. Language validation is the only failure that reaches the
// caller; every fault past that point degrades to the next tier, so each
// terminal branch hands back a usable, non-empty remedy.

pub mod api_client;
pub mod cache;
pub mod fallback;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::core::config::Config;
use crate::core::errors::{GenerationResult, ResolveError};
use crate::core::languages::LanguageCode;
use crate::core::types::{
    CacheDocument, CacheKey, RecommendationSource, RemedyRecord, ResolvedRecommendation,
};
use crate::services::recommendation::cache::RemedyStore;
use crate::services::recommendation::fallback::fallback_remedy;
use crate::utils::Metrics;

pub use api_client::GenerationClient;
pub use cache::JsonFileStore;

/// Seam for the external text-generation service. The resolver only needs
/// one operation; the HTTP client implements it, tests stub it.
pub trait RemedyGenerator: Send + Sync + 'static {
    fn generate(
        &self,
        label: &str,
        language: LanguageCode,
    ) -> impl Future<Output = GenerationResult<RemedyRecord>> + Send;
}

/// Supported language codes and their display names, for the listing
/// endpoint.
pub fn supported_languages() -> Vec<(&'static str, &'static str)> {
    LanguageCode::ALL
        .iter()
        .map(|lang| (lang.code(), lang.display_name()))
        .collect()
}

pub struct RecommendationResolver<G, S> {
    generator: Arc<G>,
    store: Arc<S>,
    cache_enabled: bool,
    /// Hard bound on how long a caller waits for generation before the
    /// fallback tier answers instead.
    generation_deadline: Duration,
    metrics: Option<Metrics>,
}

impl<G, S> RecommendationResolver<G, S>
where
    G: RemedyGenerator,
    S: RemedyStore,
{
    pub fn new(
        config: &Config,
        generator: Arc<G>,
        store: Arc<S>,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            generator,
            store,
            cache_enabled: config.cache.enabled,
            generation_deadline: Duration::from_secs(config.generation.timeout_seconds),
            metrics,
        }
    }

    /// Resolve a remedy for a predicted label in the requested language.
    ///
    /// `UnsupportedLanguage` is the only error; neither the cache nor the
    /// generation backend is consulted before validation passes.
    pub async fn resolve(
        &self,
        label: &str,
        language: &str,
    ) -> Result<ResolvedRecommendation, ResolveError> {
        let code = LanguageCode::parse(language)
            .ok_or_else(|| ResolveError::UnsupportedLanguage(language.to_string()))?;

        let key = CacheKey::new(label, code);

        if self.cache_enabled {
            if let Some(record) = self.lookup_cache(&key) {
                return Ok(self.finish(record, RecommendationSource::Cache));
            }
        }

        match self.generate_with_deadline(label, code, &key).await {
            Some(record) => Ok(self.finish(record, RecommendationSource::Generated)),
            None => {
                debug!("Serving canned remedy for {} ({})", label, code);
                Ok(self.finish(fallback_remedy(label, code), RecommendationSource::Fallback))
            }
        }
    }

    /// Cache tier. Store errors and unusable documents are both misses.
    fn lookup_cache(&self, key: &CacheKey) -> Option<RemedyRecord> {
        match self.store.get(key) {
            Ok(Some(document)) => {
                let record = document.into_record();
                if record.is_valid() {
                    debug!("Cache hit for {}", key);
                    Some(record)
                } else {
                    warn!("Cached remedy for {} is unusable, regenerating", key);
                    None
                }
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Generation tier with its cache write-back.
    ///
    /// The work runs in a detached task that hands the record back over a
    /// oneshot and then writes the cache. The caller stops waiting at the
    /// deadline; an abandoned task still finishes and primes the cache for
    /// the next request.
    async fn generate_with_deadline(
        &self,
        label: &str,
        code: LanguageCode,
        key: &CacheKey,
    ) -> Option<RemedyRecord> {
        let (tx, rx) = oneshot::channel();
        let generator = Arc::clone(&self.generator);
        let store = Arc::clone(&self.store);
        let cache_enabled = self.cache_enabled;
        let label = label.to_string();
        let task_key = key.clone();

        tokio::spawn(async move {
            match generator.generate(&label, code).await {
                Ok(record) => {
                    let _ = tx.send(record.clone());
                    if cache_enabled {
                        let document =
                            CacheDocument::from_record(&record, RecommendationSource::Generated);
                        if let Err(e) = store.put(&task_key, &document) {
                            warn!("Cache write failed for {}: {}", task_key, e);
                        }
                    }
                }
                Err(e) => {
                    warn!("Generation failed for {} ({}): {}", label, code, e);
                    // Dropping tx signals the failure to the waiting caller.
                    drop(tx);
                }
            }
        });

        match tokio::time::timeout(self.generation_deadline, rx).await {
            Ok(Ok(record)) => Some(record),
            Ok(Err(_)) => None,
            Err(_) => {
                warn!(
                    "Generation exceeded {}s deadline for {}, falling back",
                    self.generation_deadline.as_secs(),
                    key
                );
                None
            }
        }
    }

    fn finish(
        &self,
        record: RemedyRecord,
        source: RecommendationSource,
    ) -> ResolvedRecommendation {
        if let Some(ref m) = self.metrics {
            m.record_resolution(source);
        }
        ResolvedRecommendation { record, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{CacheError, CacheResult, GenerationError};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubGenerator {
        record: Option<RemedyRecord>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubGenerator {
        fn succeeding() -> Self {
            Self {
                record: Some(RemedyRecord {
                    diagnosis: "Late blight infection".into(),
                    causal_agent: "Phytophthora infestans".into(),
                    treatments: vec!["Remove infected leaves".into(), "Spray copper oxychloride".into()],
                }),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                record: None,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::succeeding()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RemedyGenerator for StubGenerator {
        async fn generate(
            &self,
            _label: &str,
            _language: LanguageCode,
        ) -> GenerationResult<RemedyRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.record.clone().ok_or_else(|| {
                GenerationError::Unavailable("stub backend down".to_string())
            })
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        documents: Mutex<HashMap<String, CacheDocument>>,
        fail_reads: bool,
        fail_writes: bool,
        gets: AtomicUsize,
    }

    impl MemoryStore {
        fn contains(&self, key: &CacheKey) -> bool {
            self.documents.lock().contains_key(key.as_str())
        }

        fn get_count(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }
    }

    impl RemedyStore for MemoryStore {
        fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheDocument>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads {
                return Err(CacheError::LoadFailed {
                    path: "memory".into(),
                    source: std::io::Error::other("simulated read failure"),
                });
            }
            Ok(self.documents.lock().get(key.as_str()).cloned())
        }

        fn put(&self, key: &CacheKey, document: &CacheDocument) -> CacheResult<()> {
            if self.fail_writes {
                return Err(CacheError::SaveFailed {
                    path: "memory".into(),
                    source: std::io::Error::other("simulated write failure"),
                });
            }
            self.documents
                .lock()
                .insert(key.as_str().to_string(), document.clone());
            Ok(())
        }
    }

    fn resolver(
        generator: StubGenerator,
        store: MemoryStore,
    ) -> RecommendationResolver<StubGenerator, MemoryStore> {
        RecommendationResolver {
            generator: Arc::new(generator),
            store: Arc::new(store),
            cache_enabled: true,
            generation_deadline: Duration::from_millis(250),
            metrics: None,
        }
    }

    /// Cache writes happen after the response is handed back; give the
    /// detached task a moment to finish.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn first_call_generates_second_call_hits_cache() {
        let r = resolver(StubGenerator::succeeding(), MemoryStore::default());

        let first = r.resolve("Tomato_Late_Blight", "hi").await.unwrap();
        assert_eq!(first.source, RecommendationSource::Generated);

        settle().await;

        let second = r.resolve("Tomato_Late_Blight", "hi").await.unwrap();
        assert_eq!(second.source, RecommendationSource::Cache);
        assert_eq!(second.record, first.record);
        // Only the first call reached the backend
        assert_eq!(r.generator.call_count(), 1);
    }

    #[tokio::test]
    async fn unsupported_language_short_circuits() {
        let r = resolver(StubGenerator::succeeding(), MemoryStore::default());

        let err = r.resolve("Tomato_Late_Blight", "xx").await.unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedLanguage(_)));

        // Neither tier was consulted
        assert_eq!(r.store.get_count(), 0);
        assert_eq!(r.generator.call_count(), 0);
    }

    #[tokio::test]
    async fn generation_failure_falls_back_with_usable_remedy() {
        let r = resolver(StubGenerator::failing(), MemoryStore::default());

        let resolved = r.resolve("Tomato_Late_Blight", "ta").await.unwrap();
        assert_eq!(resolved.source, RecommendationSource::Fallback);
        assert!(resolved.record.is_valid());
        assert!(!resolved.record.treatments.is_empty());
    }

    #[tokio::test]
    async fn slow_generation_hits_the_deadline_then_primes_the_cache() {
        let r = resolver(
            StubGenerator::slow(Duration::from_millis(400)),
            MemoryStore::default(),
        );

        let resolved = r.resolve("Tomato_Late_Blight", "en").await.unwrap();
        assert_eq!(resolved.source, RecommendationSource::Fallback);

        // The detached task completes past the deadline and still caches
        tokio::time::sleep(Duration::from_millis(500)).await;
        let key = CacheKey::new("Tomato_Late_Blight", LanguageCode::En);
        assert!(r.store.contains(&key));
    }

    #[tokio::test]
    async fn cache_read_failure_is_treated_as_a_miss() {
        let store = MemoryStore {
            fail_reads: true,
            ..MemoryStore::default()
        };
        let r = resolver(StubGenerator::succeeding(), store);

        let resolved = r.resolve("Tomato_Late_Blight", "en").await.unwrap();
        assert_eq!(resolved.source, RecommendationSource::Generated);
    }

    #[tokio::test]
    async fn cache_write_failure_does_not_affect_the_response() {
        let store = MemoryStore {
            fail_writes: true,
            ..MemoryStore::default()
        };
        let r = resolver(StubGenerator::succeeding(), store);

        let resolved = r.resolve("Tomato_Late_Blight", "en").await.unwrap();
        assert_eq!(resolved.source, RecommendationSource::Generated);
        settle().await;

        // Next call generates again instead of erroring
        let again = r.resolve("Tomato_Late_Blight", "en").await.unwrap();
        assert_eq!(again.source, RecommendationSource::Generated);
    }

    #[tokio::test]
    async fn unusable_cached_document_is_regenerated() {
        let store = MemoryStore::default();
        let key = CacheKey::new("Tomato_Late_Blight", LanguageCode::En);
        store.documents.lock().insert(
            key.as_str().to_string(),
            CacheDocument {
                diagnosis: "d".into(),
                causal_agent: "c".into(),
                treatments: vec![],
                cached_at: chrono::Utc::now(),
                source: RecommendationSource::Generated,
            },
        );
        let r = resolver(StubGenerator::succeeding(), store);

        let resolved = r.resolve("Tomato_Late_Blight", "en").await.unwrap();
        assert_eq!(resolved.source, RecommendationSource::Generated);
        assert!(resolved.record.is_valid());
    }

    #[tokio::test]
    async fn disabled_cache_skips_straight_to_generation() {
        let mut r = resolver(StubGenerator::succeeding(), MemoryStore::default());
        r.cache_enabled = false;

        let resolved = r.resolve("Tomato_Late_Blight", "en").await.unwrap();
        assert_eq!(resolved.source, RecommendationSource::Generated);
        assert_eq!(r.store.get_count(), 0);

        settle().await;
        // Nothing was written either
        assert!(!r.store.contains(&CacheKey::new("Tomato_Late_Blight", LanguageCode::En)));
    }

    #[tokio::test]
    async fn every_language_resolves_even_with_everything_down() {
        let store = MemoryStore {
            fail_reads: true,
            fail_writes: true,
            ..MemoryStore::default()
        };
        let r = resolver(StubGenerator::failing(), store);

        for lang in LanguageCode::ALL {
            let resolved = r.resolve("Maize_Rust", lang.code()).await.unwrap();
            assert!(
                !resolved.record.treatments.is_empty(),
                "empty treatments for {}",
                lang
            );
            assert_eq!(resolved.source, RecommendationSource::Fallback);
        }
    }
}
