use crate::core::errors::ConfigError;
use std::env;
use std::path::Path;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Classification model configuration
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_path: String,
    pub labels_path: String,
    /// Square edge length images are resampled to before inference.
    pub image_size: u32,
    /// Class count used when no labels file is present (placeholder sizing).
    pub default_class_count: usize,
    /// Whether a deterministic placeholder model may stand in when the ONNX
    /// weights are absent. When false, a missing model leaves the gateway in
    /// a not-ready state instead.
    pub allow_placeholder: bool,
}

/// Generation backend configuration
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_key: Option<String>,
    pub model: String,
    /// Hard deadline for one generation attempt, seconds.
    pub timeout_seconds: u64,
    pub max_retries: u32,
    /// Consecutive failures before the backend gate opens.
    pub failure_threshold: usize,
    /// How long the gate stays open before allowing a probe, seconds.
    pub cooldown_seconds: u64,
}

/// Remedy cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub cache_dir: String,
    pub max_entries: usize,
    /// Debounce interval for persisting the cache to disk, seconds.
    pub save_interval_seconds: u64,
}

/// Upload constraints enforced at the HTTP boundary
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_file_size: usize,
    pub allowed_extensions: Vec<String>,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub generation: GenerationConfig,
    pub cache: CacheConfig,
    pub upload: UploadConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Self {
        // Parse log level
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let allowed_extensions = env::var("ALLOWED_EXTENSIONS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| {
                ["png", "jpg", "jpeg", "gif", "bmp"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        Self {
            server: ServerConfig {
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8000),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
            },
            model: ModelConfig {
                model_path: env::var("MODEL_PATH")
                    .unwrap_or_else(|_| "models/pest_classifier.onnx".to_string()),
                labels_path: env::var("LABELS_PATH")
                    .unwrap_or_else(|_| "models/labels.txt".to_string()),
                image_size: env::var("IMAGE_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(224),
                default_class_count: env::var("DEFAULT_CLASS_COUNT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(66),
                allow_placeholder: env::var("MODEL_ALLOW_PLACEHOLDER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
            generation: GenerationConfig {
                api_key: env::var("GEMINI_API_KEY")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                model: env::var("GENERATION_MODEL")
                    .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
                timeout_seconds: env::var("GENERATION_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
                max_retries: env::var("GENERATION_MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
                failure_threshold: env::var("GENERATION_FAILURE_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
                cooldown_seconds: env::var("GENERATION_COOLDOWN_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            },
            cache: CacheConfig {
                enabled: env::var("CACHE_ENABLED")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
                cache_dir: env::var("CACHE_DIR").unwrap_or_else(|_| ".cache".to_string()),
                max_entries: env::var("CACHE_MAX_ENTRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10_000),
                save_interval_seconds: env::var("CACHE_SAVE_INTERVAL_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            upload: UploadConfig {
                max_file_size: env::var("MAX_FILE_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(16 * 1024 * 1024),
                allowed_extensions,
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(32..=2048).contains(&self.model.image_size) {
            return Err(ConfigError::InvalidImageSize(self.model.image_size));
        }

        if self.model.default_class_count == 0 {
            return Err(ConfigError::InvalidClassCount);
        }

        if self.generation.timeout_seconds == 0 {
            return Err(ConfigError::InvalidGenerationTimeout);
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigError::InvalidCacheCapacity);
        }

        if self.upload.max_file_size == 0 {
            return Err(ConfigError::InvalidUploadLimit);
        }

        // Validate cache directory parent exists
        let cache_path = Path::new(&self.cache.cache_dir);
        if let Some(parent) = cache_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::InvalidCachePath(format!(
                    "parent directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        Ok(())
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }
}

// Note: No Default implementation because Config::new() can fail
// Users should explicitly call Config::new()? and handle errors

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server: ServerConfig {
                port: 8000,
                host: "127.0.0.1".into(),
                log_level: Level::INFO,
            },
            model: ModelConfig {
                model_path: "models/pest_classifier.onnx".into(),
                labels_path: "models/labels.txt".into(),
                image_size: 224,
                default_class_count: 66,
                allow_placeholder: true,
            },
            generation: GenerationConfig {
                api_key: None,
                model: "gemini-1.5-flash".into(),
                timeout_seconds: 20,
                max_retries: 2,
                failure_threshold: 5,
                cooldown_seconds: 60,
            },
            cache: CacheConfig {
                enabled: true,
                cache_dir: ".cache".into(),
                max_entries: 100,
                save_interval_seconds: 30,
            },
            upload: UploadConfig {
                max_file_size: 16 * 1024 * 1024,
                allowed_extensions: vec!["png".into(), "jpg".into()],
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_zero_image_size() {
        let mut config = base_config();
        config.model.image_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidImageSize(0))
        ));
    }

    #[test]
    fn rejects_zero_class_count() {
        let mut config = base_config();
        config.model.default_class_count = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidClassCount)));
    }

    #[test]
    fn rejects_zero_generation_timeout() {
        let mut config = base_config();
        config.generation.timeout_seconds = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidGenerationTimeout)
        ));
    }
}
