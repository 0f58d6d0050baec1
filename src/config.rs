//! TOML configuration parsing and validation.
//!
//! A single file (default `./config/folio.toml`) configures the database,
//! the HTTP bind address, the three encoders held by the
//! [`ModelRegistry`](crate::registry::ModelRegistry), and the topic model.
//!
//! ```toml
//! [db]
//! path = "./data/folio.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [models.sentence]
//! provider = "local"
//! model = "bge-base-en-v1.5"
//! dims = 768
//! ```
//!
//! Every `[models.*]` section is optional and defaults to the offline
//! `hashing` encoder, so a fresh install can score papers without
//! downloading anything.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// The three encoders the analyzer draws on.
///
/// - `contextual` scores clarity (a SciBERT-style encoder in production).
/// - `sentence` produces the stored paper embedding and the uniqueness score.
/// - `general` embeds individual sentences for coherence and scores
///   academic impact.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModelsConfig {
    #[serde(default)]
    pub contextual: EncoderConfig,
    #[serde(default)]
    pub sentence: EncoderConfig,
    #[serde(default)]
    pub general: EncoderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EncoderConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider (default: `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Retries for remote providers. Zero by default: analysis surfaces
    /// a failed inference call immediately.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "hashing".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_timeout_secs() -> u64 {
    30
}

impl EncoderConfig {
    /// Output dimensionality, falling back to 768 for the hashing encoder.
    pub fn resolved_dims(&self) -> usize {
        self.dims.unwrap_or(768)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TopicsConfig {
    #[serde(default = "default_n_topics")]
    pub n_topics: usize,
    #[serde(default = "default_top_words")]
    pub top_words: usize,
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            n_topics: default_n_topics(),
            top_words: default_top_words(),
            max_features: default_max_features(),
            max_iter: default_max_iter(),
            seed: default_seed(),
        }
    }
}

fn default_n_topics() -> usize {
    10
}
fn default_top_words() -> usize {
    10
}
fn default_max_features() -> usize {
    5000
}
fn default_max_iter() -> usize {
    10
}
fn default_seed() -> u64 {
    42
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default `tracing` filter; `FOLIO_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Checks cross-field constraints that serde defaults cannot express.
pub fn validate(config: &Config) -> Result<()> {
    for (name, encoder) in [
        ("contextual", &config.models.contextual),
        ("sentence", &config.models.sentence),
        ("general", &config.models.general),
    ] {
        validate_encoder(name, encoder)?;
    }

    if config.topics.n_topics == 0 {
        anyhow::bail!("topics.n_topics must be > 0");
    }
    if config.topics.top_words == 0 {
        anyhow::bail!("topics.top_words must be > 0");
    }
    if config.topics.max_features == 0 {
        anyhow::bail!("topics.max_features must be > 0");
    }

    Ok(())
}

fn validate_encoder(name: &str, encoder: &EncoderConfig) -> Result<()> {
    match encoder.provider.as_str() {
        "disabled" | "hashing" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown encoder provider for models.{}: '{}'. Must be disabled, hashing, openai, ollama, or local.",
            name,
            other
        ),
    }

    if encoder.dims == Some(0) {
        anyhow::bail!("models.{}.dims must be > 0", name);
    }

    if matches!(encoder.provider.as_str(), "openai" | "ollama") {
        if encoder.dims.is_none() {
            anyhow::bail!(
                "models.{}.dims must be set when provider is '{}'",
                name,
                encoder.provider
            );
        }
        if encoder.model.is_none() {
            anyhow::bail!(
                "models.{}.model must be specified when provider is '{}'",
                name,
                encoder.provider
            );
        }
    }

    if encoder.batch_size == 0 {
        anyhow::bail!("models.{}.batch_size must be > 0", name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &str) -> Config {
        let text = format!(
            r#"
[db]
path = "/tmp/folio.sqlite"

[server]
bind = "127.0.0.1:8000"
{}
"#,
            extra
        );
        toml::from_str(&text).unwrap()
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = parse("");
        assert_eq!(cfg.models.sentence.provider, "hashing");
        assert_eq!(cfg.models.sentence.resolved_dims(), 768);
        assert_eq!(cfg.models.general.max_retries, 0);
        assert_eq!(cfg.topics.n_topics, 10);
        assert_eq!(cfg.topics.top_words, 10);
        assert_eq!(cfg.topics.seed, 42);
        assert_eq!(cfg.logging.level, "info");
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn unknown_provider_rejected() {
        let cfg = parse("[models.sentence]\nprovider = \"bert-over-carrier-pigeon\"\n");
        let err = validate(&cfg).unwrap_err().to_string();
        assert!(err.contains("models.sentence"), "{}", err);
    }

    #[test]
    fn remote_provider_requires_model_and_dims() {
        let cfg = parse("[models.general]\nprovider = \"openai\"\n");
        assert!(validate(&cfg).is_err());

        let cfg = parse(
            "[models.general]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n",
        );
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn zero_topics_rejected() {
        let cfg = parse("[topics]\nn_topics = 0\n");
        assert!(validate(&cfg).is_err());
    }
}
