// Model gateway: turns raw image bytes into a classification, reproducibly.
//
// One ONNX session is loaded at startup and shared for the process lifetime.
// Determinism contract: identical input bytes must produce identical
// (label, confidence, index) within a run and across restarts. That is why
// inference is pinned to the CPU execution provider with a single intra-op
// thread, parallel execution disabled, and forward passes serialized through
// a mutex. When no weights are shipped, a seeded placeholder model keeps the
// service operable with the same guarantees.

pub mod labels;
pub mod placeholder;

use chrono::Utc;
use ndarray::Array4;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::core::config::Config;
use crate::core::errors::{ClassifierError, ClassifierResult};
use crate::core::types::ClassificationResult;
use crate::services::classifier::placeholder::PlaceholderModel;
use crate::utils::image_ops::{decode_image, to_unit_tensor};
use crate::utils::Metrics;

/// Readiness report exposed through the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub ready: bool,
    pub backend: &'static str,
    pub total_classes: usize,
}

enum ModelBackend {
    Onnx { session: Mutex<Session> },
    Placeholder(PlaceholderModel),
}

impl ModelBackend {
    fn name(&self) -> &'static str {
        match self {
            ModelBackend::Onnx { .. } => "onnx",
            ModelBackend::Placeholder(_) => "placeholder",
        }
    }
}

pub struct ClassifierService {
    backend: Option<ModelBackend>,
    labels: Vec<String>,
    image_size: u32,
    metrics: Option<Metrics>,
}

impl ClassifierService {
    /// Load the model and label list once at startup.
    ///
    /// A missing or unloadable model file degrades to the placeholder
    /// backend (unless disabled), never to a startup failure.
    pub fn new(config: &Config, metrics: Option<Metrics>) -> Self {
        let labels = labels::load_labels(
            &config.model.labels_path,
            config.model.default_class_count,
        );

        let loaded = match Self::load_onnx(&config.model.model_path) {
            Ok(backend) => backend,
            Err(e) => {
                warn!("Failed to load ONNX model: {}", e);
                None
            }
        };

        let backend = match loaded {
            Some(backend) => Some(backend),
            None if config.model.allow_placeholder => {
                info!(
                    "Using deterministic placeholder model ({} classes)",
                    labels.len()
                );
                Some(ModelBackend::Placeholder(PlaceholderModel::new(labels.len())))
            }
            None => {
                warn!("No model available and placeholder disabled, gateway not ready");
                None
            }
        };

        if let Some(ref b) = backend {
            info!(
                "Classifier ready: backend={} classes={} image_size={}",
                b.name(),
                labels.len(),
                config.model.image_size
            );
        }

        Self {
            backend,
            labels,
            image_size: config.model.image_size,
            metrics,
        }
    }

    fn load_onnx(path: &str) -> Result<Option<ModelBackend>, ort::Error> {
        if !Path::new(path).exists() {
            warn!("Model file not found at {}", path);
            return Ok(None);
        }

        // CPU provider, one intra-op thread, no parallel execution: the
        // combination that keeps repeated forward passes bit-identical.
        let session = Session::builder()?
            .with_execution_providers([CPUExecutionProvider::default().build()])?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_parallel_execution(false)?
            .with_intra_threads(1)?
            .commit_from_file(path)?;

        info!("Loaded ONNX model from {}", path);

        Ok(Some(ModelBackend::Onnx {
            session: Mutex::new(session),
        }))
    }

    pub fn is_ready(&self) -> bool {
        self.backend.is_some()
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            ready: self.is_ready(),
            backend: self.backend.as_ref().map(|b| b.name()).unwrap_or("none"),
            total_classes: self.labels.len(),
        }
    }

    pub fn total_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Decode, preprocess and classify uploaded bytes.
    ///
    /// Decoding and resampling are CPU-bound, so they run on the blocking
    /// pool; the forward pass itself is serialized behind the session mutex.
    pub async fn classify_bytes(&self, bytes: &[u8]) -> ClassifierResult<ClassificationResult> {
        if self.backend.is_none() {
            return Err(ClassifierError::NotReady);
        }

        let size = self.image_size;
        let owned = bytes.to_vec();
        let tensor = tokio::task::spawn_blocking(move || {
            let img = decode_image(&owned)?;
            Ok::<_, ClassifierError>(to_unit_tensor(&img, size))
        })
        .await
        .map_err(|e| ClassifierError::TaskFailed(e.to_string()))??;

        self.classify(tensor).await
    }

    /// Single forward pass over a preprocessed tensor.
    pub async fn classify(&self, tensor: Array4<f32>) -> ClassifierResult<ClassificationResult> {
        let backend = self.backend.as_ref().ok_or(ClassifierError::NotReady)?;
        let start = Instant::now();

        let scores: Vec<f32> = match backend {
            ModelBackend::Onnx { session } => {
                let value = Value::from_array(tensor)?;
                let mut session = session.lock().await;
                // Single input, single output: bind positionally so converted
                // models keep working regardless of their tensor names.
                let outputs = session.run(ort::inputs![value])?;
                let (_shape, data) = outputs[0].try_extract_tensor::<f32>()?;
                data.to_vec()
            }
            ModelBackend::Placeholder(model) => model.infer(&tensor),
        };

        if scores.is_empty() {
            return Err(ClassifierError::MalformedOutput(
                "model returned an empty score vector".to_string(),
            ));
        }

        let (index, raw_confidence) = scores
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, &c)| (i, c))
            .ok_or_else(|| {
                ClassifierError::MalformedOutput("no arg-max over score vector".to_string())
            })?;

        // Numerical noise guard
        let confidence = raw_confidence.clamp(0.0, 1.0);
        let label = labels::label_for_index(&self.labels, index);

        let elapsed = start.elapsed();
        if let Some(ref m) = self.metrics {
            m.record_classification(elapsed);
        }
        debug!(
            "Classified as {} (confidence={:.4}, index={}) in {:.2}ms",
            label,
            confidence,
            index,
            elapsed.as_secs_f64() * 1000.0
        );

        Ok(ClassificationResult {
            label,
            confidence,
            index,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{
        CacheConfig, GenerationConfig, ModelConfig, ServerConfig, UploadConfig,
    };
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use tracing::Level;

    fn placeholder_config() -> Config {
        Config {
            server: ServerConfig {
                port: 8000,
                host: "127.0.0.1".into(),
                log_level: Level::INFO,
            },
            model: ModelConfig {
                model_path: "does/not/exist.onnx".into(),
                labels_path: "does/not/exist.txt".into(),
                image_size: 64,
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
                save_interval_seconds: 0,
            },
            upload: UploadConfig {
                max_file_size: 16 * 1024 * 1024,
                allowed_extensions: vec!["png".into()],
            },
        }
    }

    fn sample_png() -> Vec<u8> {
        let img = ImageBuffer::from_fn(50, 40, |x, y| {
            Rgb([(x * 5 % 256) as u8, (y * 3 % 256) as u8, 90u8])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn classification_is_deterministic_for_identical_bytes() {
        let service = ClassifierService::new(&placeholder_config(), None);
        let bytes = sample_png();

        let first = service.classify_bytes(&bytes).await.unwrap();
        let second = service.classify_bytes(&bytes).await.unwrap();

        assert_eq!(first.label, second.label);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.index, second.index);
    }

    #[tokio::test]
    async fn confidence_is_within_unit_interval() {
        let service = ClassifierService::new(&placeholder_config(), None);
        let result = service.classify_bytes(&sample_png()).await.unwrap();
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!(result.index < service.total_classes());
    }

    #[tokio::test]
    async fn corrupted_bytes_fail_without_poisoning_the_gateway() {
        let service = ClassifierService::new(&placeholder_config(), None);

        let err = service.classify_bytes(b"not an image").await.unwrap_err();
        assert!(matches!(err, ClassifierError::DecodeFailed(_)));

        // Gateway keeps serving after a bad upload
        assert!(service.classify_bytes(&sample_png()).await.is_ok());
    }

    #[tokio::test]
    async fn missing_model_without_placeholder_reports_not_ready() {
        let mut config = placeholder_config();
        config.model.allow_placeholder = false;
        let service = ClassifierService::new(&config, None);

        assert!(!service.is_ready());
        assert_eq!(service.status().backend, "none");
        let err = service.classify_bytes(&sample_png()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::NotReady));
    }

    #[test]
    fn status_reports_placeholder_backend() {
        let service = ClassifierService::new(&placeholder_config(), None);
        let status = service.status();
        assert!(status.ready);
        assert_eq!(status.backend, "placeholder");
        assert_eq!(status.total_classes, 66);
    }
}
