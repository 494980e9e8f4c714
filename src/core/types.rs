// Core data model for the classification and recommendation pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::languages::LanguageCode;

/// Delimiter between the label and the language code inside a cache key.
const CACHE_KEY_DELIMITER: &str = "::";

/// Output of a single classification call. Ephemeral: built per request,
/// never persisted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Label from the fixed label list, or a synthetic `unknown_class_<i>`
    /// name when the model's raw index exceeds the known list.
    pub label: String,
    /// Softmax confidence, clamped into [0, 1].
    pub confidence: f32,
    /// Raw arg-max index from the model output.
    pub index: usize,
    pub timestamp: DateTime<Utc>,
}

/// A structured remedy, whichever tier produced it.
///
/// Invariant: `treatments` is non-empty on every path out of the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemedyRecord {
    pub diagnosis: String,
    pub causal_agent: String,
    pub treatments: Vec<String>,
}

impl RemedyRecord {
    /// A record is usable when all three fields carry content.
    pub fn is_valid(&self) -> bool {
        !self.diagnosis.is_empty()
            && !self.causal_agent.is_empty()
            && !self.treatments.is_empty()
            && self.treatments.iter().all(|t| !t.is_empty())
    }
}

/// Which tier of the resolver produced a remedy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    Cache,
    Generated,
    Fallback,
}

impl fmt::Display for RecommendationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecommendationSource::Cache => "cache",
            RecommendationSource::Generated => "generated",
            RecommendationSource::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// The resolver's sole output: a remedy plus its provenance. Never empty,
/// never an error.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRecommendation {
    pub record: RemedyRecord,
    pub source: RecommendationSource,
}

/// Composite cache key for a (label, language) pair.
///
/// A label that itself contains `"::"` can collide with a different
/// (label, language) pair; labels in the shipped list never do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(label: &str, language: LanguageCode) -> Self {
        CacheKey(format!("{}{}{}", label, CACHE_KEY_DELIMITER, language.code()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted cache document: the remedy plus write metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheDocument {
    pub diagnosis: String,
    pub causal_agent: String,
    pub treatments: Vec<String>,
    pub cached_at: DateTime<Utc>,
    pub source: RecommendationSource,
}

impl CacheDocument {
    pub fn from_record(record: &RemedyRecord, source: RecommendationSource) -> Self {
        Self {
            diagnosis: record.diagnosis.clone(),
            causal_agent: record.causal_agent.clone(),
            treatments: record.treatments.clone(),
            cached_at: Utc::now(),
            source,
        }
    }

    pub fn into_record(self) -> RemedyRecord {
        RemedyRecord {
            diagnosis: self.diagnosis,
            causal_agent: self.causal_agent,
            treatments: self.treatments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_joins_label_and_code() {
        let key = CacheKey::new("Tomato_Late_Blight", LanguageCode::Hi);
        assert_eq!(key.as_str(), "Tomato_Late_Blight::hi");
    }

    #[test]
    fn cache_keys_differ_per_language() {
        let a = CacheKey::new("Tomato_Late_Blight", LanguageCode::Hi);
        let b = CacheKey::new("Tomato_Late_Blight", LanguageCode::Ta);
        assert_ne!(a, b);
    }

    #[test]
    fn record_validation_rejects_empty_treatments() {
        let record = RemedyRecord {
            diagnosis: "d".into(),
            causal_agent: "c".into(),
            treatments: vec![],
        };
        assert!(!record.is_valid());
    }

    #[test]
    fn cache_document_round_trips_record() {
        let record = RemedyRecord {
            diagnosis: "d".into(),
            causal_agent: "c".into(),
            treatments: vec!["t1".into(), "t2".into()],
        };
        let doc = CacheDocument::from_record(&record, RecommendationSource::Generated);
        assert_eq!(doc.into_record(), record);
    }

    #[test]
    fn source_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RecommendationSource::Fallback).unwrap(),
            "\"fallback\""
        );
    }
}
