// Library exports for the pest detection and recommendation backend

// Core modules
pub mod core;
pub mod middleware;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{CacheError, ClassifierError, ConfigError, GenerationError, ResolveError},
    languages::LanguageCode,
    types::{
        CacheDocument, CacheKey, ClassificationResult, RecommendationSource, RemedyRecord,
        ResolvedRecommendation,
    },
};

pub use middleware::{BackendHealth, BackendHealthConfig};

pub use services::{
    classifier::{ClassifierService, ModelStatus},
    recommendation::{
        supported_languages, GenerationClient, JsonFileStore, RecommendationResolver,
        RemedyGenerator,
    },
};

pub use utils::Metrics;
