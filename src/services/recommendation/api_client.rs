// Generation backend client for remedy text
//
// Builds a language-specific agronomist prompt for a predicted label, sends
// it to the Gemini generateContent endpoint, and parses the reply as a
// structured remedy. The response text is treated as adversarial input:
// fenced code blocks are stripped and every required field is validated
// before anything reaches the resolver. All failure shapes (timeout,
// transport, invalid payload, cooling-down backend) collapse into
// `GenerationError`; the resolver only cares that generation failed.

use anyhow::{Context, Result};
use rand::Rng;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{GenerationError, GenerationResult};
use crate::core::languages::LanguageCode;
use crate::core::types::RemedyRecord;
use crate::middleware::BackendHealth;
use crate::services::recommendation::RemedyGenerator;
use crate::utils::Metrics;

const GENERATION_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Wire shape of the remedy payload inside the model's JSON reply.
#[derive(Debug, Deserialize)]
struct GenerationPayload {
    diagnosis: String,
    causal_agent: String,
    treatments: Vec<String>,
}

pub struct GenerationClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    timeout_seconds: u64,
    max_retries: u32,
    health: BackendHealth,
    metrics: Option<Metrics>,
}

impl GenerationClient {
    pub fn new(
        config: &Config,
        health: BackendHealth,
        metrics: Option<Metrics>,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(config.generation.timeout_seconds);

        // Connection pooling plus a hard per-request deadline; the resolver
        // adds its own deadline on top, so neither side waits forever.
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            api_key: config.generation.api_key.clone(),
            model: config.generation.model.clone(),
            timeout_seconds: config.generation.timeout_seconds,
            max_retries: config.generation.max_retries,
            health,
            metrics,
        })
    }

    pub fn health(&self) -> &BackendHealth {
        &self.health
    }

    #[instrument(skip(self), fields(label = label, lang = %language))]
    async fn generate_remedy(
        &self,
        label: &str,
        language: LanguageCode,
    ) -> GenerationResult<RemedyRecord> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            GenerationError::Unavailable("no generation API key configured".to_string())
        })?;

        if !self.health.allow_request() {
            return Err(GenerationError::Unavailable(
                "generation backend is cooling down".to_string(),
            ));
        }

        let url = format!(
            "{}/{}:generateContent?key={}",
            GENERATION_ENDPOINT, self.model, api_key
        );
        let body = build_request_body(label, language);

        let start = Instant::now();
        let result = self.send_with_retries(&url, &body).await.and_then(|text| {
            parse_remedy_response(&text)
        });
        let duration = start.elapsed();

        match result {
            Ok(record) => {
                self.health.record_success();
                if let Some(ref m) = self.metrics {
                    m.record_generation(true, duration);
                }
                debug!(
                    "Generated remedy for {} in {:.2}s",
                    label,
                    duration.as_secs_f64()
                );
                Ok(record)
            }
            Err(e) => {
                self.health.record_failure();
                if let Some(ref m) = self.metrics {
                    m.record_generation(false, duration);
                }
                warn!("Remedy generation failed for {}: {}", label, e);
                Err(e)
            }
        }
    }

    /// Send the request, retrying transient failures with exponential
    /// backoff and jitter. Returns the raw response body on success.
    async fn send_with_retries(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> GenerationResult<String> {
        for attempt in 0..=self.max_retries {
            match self.http_client.post(url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.text().await.map_err(GenerationError::Transport);
                    }

                    let retryable = status.as_u16() == 429 || status.as_u16() == 503;
                    let error_text = response.text().await.unwrap_or_default();

                    if retryable && attempt < self.max_retries {
                        debug!(
                            "Generation request got {} (attempt {}/{}), backing off",
                            status,
                            attempt + 1,
                            self.max_retries
                        );
                        backoff_sleep(attempt).await;
                        continue;
                    }

                    return Err(GenerationError::Unavailable(format!(
                        "{} - {}",
                        status, error_text
                    )));
                }
                Err(e) => {
                    if e.is_timeout() {
                        return Err(GenerationError::Timeout(self.timeout_seconds));
                    }
                    if attempt < self.max_retries {
                        debug!(
                            "Generation transport error (attempt {}/{}): {}",
                            attempt + 1,
                            self.max_retries,
                            e
                        );
                        backoff_sleep(attempt).await;
                        continue;
                    }
                    return Err(GenerationError::Transport(e));
                }
            }
        }

        Err(GenerationError::Unavailable(format!(
            "exhausted {} retries",
            self.max_retries
        )))
    }
}

impl RemedyGenerator for GenerationClient {
    async fn generate(
        &self,
        label: &str,
        language: LanguageCode,
    ) -> GenerationResult<RemedyRecord> {
        self.generate_remedy(label, language).await
    }
}

async fn backoff_sleep(attempt: u32) {
    let base_delay = 2_u64.pow(attempt);
    let jitter = rand::thread_rng().gen_range(0..1000);
    tokio::time::sleep(Duration::from_millis(base_delay * 1000 + jitter)).await;
}

fn build_request_body(label: &str, language: LanguageCode) -> serde_json::Value {
    let language_name = language.prompt_name();
    let prompt = format!(
        "You are an expert agricultural pathologist specializing in Indian farming practices.\n\
         Analyze this plant disease/pest: \"{label}\"\n\n\
         Respond in {language_name} with:\n\
         1. diagnosis: detailed description of the condition, its symptoms, and impact on the crop\n\
         2. causal_agent: scientific name and type of pathogen/pest (fungus, bacteria, virus, insect, etc.)\n\
         3. treatments: 3-4 practical recommendations for small-scale Indian farmers, covering organic \
         remedies from common household items, pesticides/fungicides available in Indian markets, and \
         preventive agricultural practices\n\n\
         Use simple, farmer-friendly language and keep all text in {language_name}."
    );

    serde_json::json!({
        "contents": [{
            "parts": [{"text": prompt}]
        }],
        "generationConfig": {
            "response_mime_type": "application/json",
            "response_schema": {
                "type": "object",
                "properties": {
                    "diagnosis": {"type": "string"},
                    "causal_agent": {"type": "string"},
                    "treatments": {
                        "type": "array",
                        "items": {"type": "string"}
                    }
                },
                "required": ["diagnosis", "causal_agent", "treatments"]
            }
        }
    })
}

/// Extract and validate the remedy payload from a raw API response body.
fn parse_remedy_response(response_text: &str) -> GenerationResult<RemedyRecord> {
    let envelope: serde_json::Value = serde_json::from_str(response_text)
        .map_err(|e| GenerationError::InvalidPayload(format!("unparseable response: {}", e)))?;

    let payload_text = envelope
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| {
            GenerationError::InvalidPayload("response carries no text part".to_string())
        })?;

    let payload: GenerationPayload = serde_json::from_str(strip_code_fences(payload_text))
        .map_err(|e| GenerationError::InvalidPayload(format!("schema mismatch: {}", e)))?;

    let record = RemedyRecord {
        diagnosis: payload.diagnosis,
        causal_agent: payload.causal_agent,
        treatments: payload.treatments,
    };

    if !record.is_valid() {
        return Err(GenerationError::InvalidPayload(
            "payload has empty required fields".to_string(),
        ));
    }

    Ok(record)
}

/// Models wrap JSON in fenced code blocks often enough that the payload is
/// unfenced before parsing.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}
