// Custom error types for better error handling and debugging
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Automatic Display/Error trait implementations
// - Source error chaining

use thiserror::Error;

/// Model gateway errors
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("image bytes could not be decoded: {0}")]
    DecodeFailed(#[source] image::ImageError),

    #[error("ONNX inference failed: {0}")]
    InferenceFailed(#[from] ort::Error),

    #[error("classification model is not available")]
    NotReady,

    #[error("model produced an unusable output tensor: {0}")]
    MalformedOutput(String),

    #[error("classification task failed: {0}")]
    TaskFailed(String),
}

/// Generation backend errors. The resolver treats every variant the same way
/// (fall through to the canned tier); the variants exist for logging.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request timed out after {0}s")]
    Timeout(u64),

    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("generation backend returned an invalid payload: {0}")]
    InvalidPayload(String),

    #[error("generation backend is unavailable: {0}")]
    Unavailable(String),
}

/// Cache store errors. Never fatal: a failed read is a miss, a failed write
/// is logged and dropped.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read cache file {path}: {source}")]
    LoadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write cache file {path}: {source}")]
    SaveFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("cache document could not be deserialized: {0}")]
    DeserializationFailed(#[from] serde_json::Error),

    #[error("cache directory creation failed: {0}")]
    DirectoryCreationFailed(std::io::Error),
}

/// Resolver errors visible to the caller. Validation is the only path that
/// can fail upward; every later stage degrades to a lower tier instead.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unsupported language code: {0}")]
    UnsupportedLanguage(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("image size must be between 32 and 2048, got {0}")]
    InvalidImageSize(u32),

    #[error("default class count must be > 0")]
    InvalidClassCount,

    #[error("generation timeout must be > 0 seconds")]
    InvalidGenerationTimeout,

    #[error("cache max entries must be > 0")]
    InvalidCacheCapacity,

    #[error("upload size limit must be > 0")]
    InvalidUploadLimit,

    #[error("invalid cache path: {0}")]
    InvalidCachePath(String),

    #[error("environment variable parsing failed: {0}")]
    EnvVarError(String),
}

// Convenience type aliases for Results
pub type ClassifierResult<T> = Result<T, ClassifierError>;
pub type GenerationResult<T> = Result<T, GenerationError>;
pub type CacheResult<T> = Result<T, CacheError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
