//! Text encoder abstraction and implementations.
//!
//! Every model the analyzer consults is an [`Encoder`]: something that turns
//! a batch of texts into fixed-length vectors. Implementations:
//! - **[`DisabledEncoder`]**: always fails; lets a deployment switch a model off.
//! - **[`HashingEncoder`]**: deterministic signed feature hashing of unigrams
//!   and bigrams. Offline, dependency-free, and the default.
//! - **[`OpenAIEncoder`]**: calls the OpenAI embeddings API.
//! - **[`OllamaEncoder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalEncoder`**: runs an ONNX model in-process via fastembed
//!   (feature `local-encoders-fastembed`). The model is loaded once when the
//!   encoder is created.
//!
//! Also provides vector utilities used by the store and the scorers:
//! [`cosine_similarity`], [`vec_to_blob`], [`blob_to_vec`].
//!
//! # Retry Strategy
//!
//! Remote encoders retry only when `max_retries > 0` (default 0):
//! - HTTP 429 and 5xx → retry with backoff 1s, 2s, 4s, ... (capped at 2^5)
//! - other HTTP 4xx → fail immediately
//! - network errors → retry

use anyhow::{bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EncoderConfig;

/// A pre-trained text encoder.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Returns the model identifier (e.g. `"bge-base-en-v1.5"`).
    fn model_name(&self) -> &str;
    /// Returns the output dimensionality (e.g. `768`).
    fn dims(&self) -> usize;
    /// Encodes a batch of texts, returning one vector per input in order.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Encode a single text.
pub async fn encode_one(encoder: &dyn Encoder, text: &str) -> Result<Vec<f32>> {
    let results = encoder.encode(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response from {}", encoder.model_name()))
}

// ============ Disabled ============

pub struct DisabledEncoder;

#[async_trait]
impl Encoder for DisabledEncoder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn encode(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Encoder is disabled")
    }
}

// ============ Hashing ============

/// Signed feature-hashing encoder.
///
/// Lowercased word unigrams (weight 1.0) and bigrams (weight 0.5) are hashed
/// with SHA-256 into `dims` buckets; the sign comes from a separate hash bit
/// so collisions tend to cancel. Output is L2-normalized. Empty text maps to
/// the zero vector.
pub struct HashingEncoder {
    name: String,
    dims: usize,
}

impl HashingEncoder {
    pub fn new(dims: usize) -> Self {
        Self {
            name: format!("hashing-{}", dims),
            dims,
        }
    }

    pub fn encode_text(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];
        if self.dims == 0 {
            return vec;
        }

        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        for word in &words {
            self.accumulate(&mut vec, word, 1.0);
        }
        for pair in words.windows(2) {
            self.accumulate(&mut vec, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in vec.iter_mut() {
                *x /= norm;
            }
        }
        vec
    }

    fn accumulate(&self, vec: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vec[index] += sign * weight;
    }
}

#[async_trait]
impl Encoder for HashingEncoder {
    fn model_name(&self) -> &str {
        &self.name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.encode_text(t)).collect())
    }
}

// ============ OpenAI ============

/// Encoder backed by `POST https://api.openai.com/v1/embeddings`.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIEncoder {
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIEncoder {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("model required for OpenAI encoder"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("dims required for OpenAI encoder"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Encoder for OpenAIEncoder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body);

        let json = send_with_retry(request, self.max_retries, "OpenAI").await?;
        parse_openai_response(&json)
    }
}

/// Extracts `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .unwrap_or(position as u64);
        indexed.push((index, json_floats(embedding)));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Encoder backed by a local Ollama instance (`POST {url}/api/embed`).
pub struct OllamaEncoder {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEncoder {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("model required for Ollama encoder"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("dims required for Ollama encoder"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            url,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Encoder for OllamaEncoder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = self
            .client
            .post(format!("{}/api/embed", self.url))
            .header("Content-Type", "application/json")
            .json(&body);

        let json = send_with_retry(request, self.max_retries, "Ollama")
            .await
            .map_err(|e| anyhow::anyhow!("{} (is Ollama running at {}?)", e, self.url))?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .map(|values| json_floats(values))
                .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))
        })
        .collect()
}

fn json_floats(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

/// Sends a JSON request, retrying 429/5xx/network failures up to `max_retries` times.
async fn send_with_retry(
    request: reqwest::RequestBuilder,
    max_retries: u32,
    service: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(service, attempt, "retrying encoder request");
            tokio::time::sleep(delay).await;
        }

        let attempt_request = request
            .try_clone()
            .ok_or_else(|| anyhow::anyhow!("{} request body is not cloneable", service))?;

        match attempt_request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        service,
                        status,
                        body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!("{} connection error: {}", service, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed", service)))
}

// ============ Local (fastembed) ============

/// In-process ONNX encoder. The model is downloaded from Hugging Face on
/// first use, cached, and loaded once per encoder instance.
#[cfg(feature = "local-encoders-fastembed")]
pub struct LocalEncoder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-encoders-fastembed")]
impl LocalEncoder {
    pub async fn load(config: &EncoderConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        let fastembed_model = config_to_fastembed_model(&model_name)?;

        let model = tokio::task::spawn_blocking(move || {
            fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(fastembed_model).with_show_download_progress(false),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize local encoder: {}", e))
        })
        .await??;

        tracing::info!(model = %model_name, dims, "loaded local encoder");

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: Arc::new(std::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-encoders-fastembed")]
#[async_trait]
impl Encoder for LocalEncoder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.model.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow::anyhow!("local encoder lock poisoned"))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }
}

#[cfg(feature = "local-encoders-fastembed")]
fn resolve_local_model(config: &EncoderConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| "bge-base-en-v1.5".to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "all-minilm-l6-v2" => 384,
        "bge-small-en-v1.5" => 384,
        "bge-base-en-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        _ => 768,
    });

    (model_name, dims)
}

#[cfg(feature = "local-encoders-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => bail!(
            "Unknown local encoder model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5",
            other
        ),
    }
}

/// Create the encoder named by `config.provider`.
///
/// | Config Value | Encoder |
/// |-------------|---------|
/// | `"disabled"` | [`DisabledEncoder`] |
/// | `"hashing"` | [`HashingEncoder`] |
/// | `"openai"` | [`OpenAIEncoder`] |
/// | `"ollama"` | [`OllamaEncoder`] |
/// | `"local"` | `LocalEncoder` (feature `local-encoders-fastembed`) |
pub async fn create_encoder(config: &EncoderConfig) -> Result<Arc<dyn Encoder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEncoder)),
        "hashing" => Ok(Arc::new(HashingEncoder::new(config.resolved_dims()))),
        "openai" => Ok(Arc::new(OpenAIEncoder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEncoder::new(config)?)),
        #[cfg(feature = "local-encoders-fastembed")]
        "local" => Ok(Arc::new(LocalEncoder::load(config).await?)),
        #[cfg(not(feature = "local-encoders-fastembed"))]
        "local" => bail!("Local encoder provider requires --features local-encoders-fastembed"),
        other => bail!("Unknown encoder provider: {}", other),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use research_folio::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a zero
/// vector on either side.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_hashing_dims_and_norm() {
        let encoder = HashingEncoder::new(768);
        let v = encoder.encode_text("Graph neural networks for protein folding");
        assert_eq!(v.len(), 768);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_deterministic_and_case_insensitive() {
        let encoder = HashingEncoder::new(128);
        assert_eq!(
            encoder.encode_text("Sparse Attention"),
            encoder.encode_text("sparse attention")
        );
    }

    #[test]
    fn test_hashing_empty_is_zero() {
        let encoder = HashingEncoder::new(16);
        assert!(encoder.encode_text("").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_hashing_related_texts_closer() {
        let encoder = HashingEncoder::new(512);
        let a = encoder.encode_text("deep learning for image classification");
        let b = encoder.encode_text("deep learning for image segmentation");
        let c = encoder.encode_text("medieval tax records of rural parishes");
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[tokio::test]
    async fn test_disabled_encoder_fails() {
        let err = encode_one(&DisabledEncoder, "anything").await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[tokio::test]
    async fn test_create_hashing_from_config() {
        let config = EncoderConfig {
            dims: Some(64),
            ..EncoderConfig::default()
        };
        let encoder = create_encoder(&config).await.unwrap();
        assert_eq!(encoder.dims(), 64);
        assert_eq!(encoder.model_name(), "hashing-64");
    }

    #[test]
    fn test_parse_openai_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [0.5, 0.5]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let parsed = parse_openai_response(&json).unwrap();
        assert_eq!(parsed, vec![vec![1.0, 0.0], vec![0.5, 0.5]]);
    }

    #[test]
    fn test_parse_ollama_missing_array() {
        let json = serde_json::json!({"model": "nomic-embed-text"});
        assert!(parse_ollama_response(&json).is_err());
    }

    #[test]
    fn test_blob_roundtrip() {
        let v = vec![0.25f32, -1.5, 8.0];
        assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
    }
}
