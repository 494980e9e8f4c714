pub mod config;
pub mod errors;
pub mod languages;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    CacheError, ClassifierError, ConfigError, GenerationError, ResolveError,
};
pub use languages::LanguageCode;
pub use types::{
    CacheDocument, CacheKey, ClassificationResult, RecommendationSource, RemedyRecord,
    ResolvedRecommendation,
};
