//! Model registry: the explicitly-owned set of inference handles the
//! analyzer draws on.
//!
//! Built once at startup and shared read-only behind an `Arc` for the
//! process lifetime. Request handlers receive it through the
//! [`Analyzer`](crate::analysis::Analyzer); nothing here is global.
//!
//! Two anchor vectors (a generic boilerplate abstract and a high-impact
//! reference abstract) are derived from the registry's own encoders the
//! first time a scorer asks for them and cached afterwards.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::{ModelsConfig, TopicsConfig};
use crate::embedding::{create_encoder, encode_one, Encoder};

/// Reference text that reads like any paper. Uniqueness measures distance from it.
pub const GENERIC_ANCHOR_TEXT: &str = "In this paper we present a study of the problem. \
    We describe our approach and method, report the results of our experiments, \
    and discuss the findings, limitations, and directions for future work.";

/// Reference text describing influential work. Academic impact measures closeness to it.
pub const IMPACT_ANCHOR_TEXT: &str = "This landmark work establishes a widely adopted \
    foundation for the field, resolves a long-standing open problem, and has had broad \
    influence on subsequent research, theory, and practice.";

pub struct ModelRegistry {
    /// Contextual text encoder (clarity).
    pub contextual: Arc<dyn Encoder>,
    /// Sentence-embedding encoder (stored paper embeddings, uniqueness).
    pub sentence: Arc<dyn Encoder>,
    /// General-purpose sentence encoder (coherence, academic impact).
    pub general: Arc<dyn Encoder>,
    /// Topic model settings.
    pub topics: TopicsConfig,
    generic_anchor: OnceCell<Vec<f32>>,
    impact_anchor: OnceCell<Vec<f32>>,
}

impl ModelRegistry {
    /// Creates all encoders named in the configuration.
    ///
    /// Local encoders load their weights here, so this can take a while on
    /// first run.
    pub async fn load(models: &ModelsConfig, topics: &TopicsConfig) -> Result<Self> {
        let contextual = create_encoder(&models.contextual).await?;
        let sentence = create_encoder(&models.sentence).await?;
        let general = create_encoder(&models.general).await?;

        tracing::info!(
            contextual = contextual.model_name(),
            sentence = sentence.model_name(),
            general = general.model_name(),
            "model registry loaded"
        );

        Ok(Self::from_encoders(contextual, sentence, general, topics.clone()))
    }

    /// Assembles a registry from already-constructed encoders.
    pub fn from_encoders(
        contextual: Arc<dyn Encoder>,
        sentence: Arc<dyn Encoder>,
        general: Arc<dyn Encoder>,
        topics: TopicsConfig,
    ) -> Self {
        Self {
            contextual,
            sentence,
            general,
            topics,
            generic_anchor: OnceCell::new(),
            impact_anchor: OnceCell::new(),
        }
    }

    /// Sentence-encoder vector of [`GENERIC_ANCHOR_TEXT`].
    pub async fn generic_anchor(&self) -> Result<&[f32]> {
        let v = self
            .generic_anchor
            .get_or_try_init(|| encode_one(self.sentence.as_ref(), GENERIC_ANCHOR_TEXT))
            .await?;
        Ok(v.as_slice())
    }

    /// General-encoder vector of [`IMPACT_ANCHOR_TEXT`].
    pub async fn impact_anchor(&self) -> Result<&[f32]> {
        let v = self
            .impact_anchor
            .get_or_try_init(|| encode_one(self.general.as_ref(), IMPACT_ANCHOR_TEXT))
            .await?;
        Ok(v.as_slice())
    }

    /// Dimensionality of stored paper embeddings.
    pub fn embedding_dims(&self) -> usize {
        self.sentence.dims()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DisabledEncoder, HashingEncoder};

    #[tokio::test]
    async fn anchors_are_cached_and_sized() {
        let registry = ModelRegistry::from_encoders(
            Arc::new(HashingEncoder::new(32)),
            Arc::new(HashingEncoder::new(64)),
            Arc::new(HashingEncoder::new(48)),
            TopicsConfig::default(),
        );
        let first = registry.generic_anchor().await.unwrap().to_vec();
        let second = registry.generic_anchor().await.unwrap().to_vec();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert_eq!(registry.impact_anchor().await.unwrap().len(), 48);
        assert_eq!(registry.embedding_dims(), 64);
    }

    #[tokio::test]
    async fn anchor_fails_with_disabled_encoder() {
        let registry = ModelRegistry::from_encoders(
            Arc::new(HashingEncoder::new(32)),
            Arc::new(DisabledEncoder),
            Arc::new(HashingEncoder::new(32)),
            TopicsConfig::default(),
        );
        assert!(registry.generic_anchor().await.is_err());
    }

    #[tokio::test]
    async fn load_uses_hashing_defaults() {
        let registry = ModelRegistry::load(&ModelsConfig::default(), &TopicsConfig::default())
            .await
            .unwrap();
        assert_eq!(registry.embedding_dims(), 768);
        assert_eq!(registry.contextual.model_name(), "hashing-768");
    }
}
