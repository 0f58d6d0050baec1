//! Content-quality scoring: clarity, coherence, and technical depth.

use anyhow::Result;

use super::text::{count_distinct_terms, saturate, sentences, TECHNICAL_TERMS};
use super::{AnalysisInput, ContentQuality};
use crate::embedding::{cosine_similarity, encode_one};
use crate::registry::ModelRegistry;

/// Coherence reported when content has fewer than two sentences.
pub const SHORT_CONTENT_COHERENCE: f64 = 0.8;

/// Sentences beyond this are not embedded for coherence.
pub const MAX_COHERENCE_SENTENCES: usize = 256;

/// Distinct technical terms at which depth saturates.
pub const TECHNICAL_DEPTH_CAP: usize = 100;

pub async fn score(models: &ModelRegistry, input: &AnalysisInput) -> Result<ContentQuality> {
    let global = input.global_text();
    let (clarity, coherence) = tokio::try_join!(
        clarity(models, &global),
        coherence(models, &input.content),
    )?;
    let depth = technical_depth(&input.full_text());
    Ok(ContentQuality::new(clarity, coherence, depth))
}

/// `sqrt(d) * std(v / |v|)` of the contextual encoding.
///
/// A vector spread evenly over its dimensions scores near 0; one that
/// concentrates its mass scores near 1.
async fn clarity(models: &ModelRegistry, text: &str) -> Result<f64> {
    let v = encode_one(models.contextual.as_ref(), text).await?;
    Ok(normalized_dispersion(&v))
}

pub(crate) fn normalized_dispersion(v: &[f32]) -> f64 {
    let norm = v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if v.is_empty() || norm == 0.0 {
        return 0.0;
    }
    let d = v.len() as f64;
    let unit: Vec<f64> = v.iter().map(|x| *x as f64 / norm).collect();
    let mean = unit.iter().sum::<f64>() / d;
    let variance = unit.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / d;
    d.sqrt() * variance.sqrt()
}

async fn coherence(models: &ModelRegistry, content: &str) -> Result<f64> {
    let parts: Vec<String> = sentences(content)
        .into_iter()
        .take(MAX_COHERENCE_SENTENCES)
        .map(str::to_string)
        .collect();
    if parts.len() < 2 {
        return Ok(SHORT_CONTENT_COHERENCE);
    }

    let vectors = models.general.encode(&parts).await?;
    Ok(mean_pairwise_similarity(&vectors))
}

pub(crate) fn mean_pairwise_similarity(vectors: &[Vec<f32>]) -> f64 {
    let mut total = 0.0f64;
    let mut pairs = 0usize;
    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            total += cosine_similarity(&vectors[i], &vectors[j]) as f64;
            pairs += 1;
        }
    }
    if pairs == 0 {
        return SHORT_CONTENT_COHERENCE;
    }
    (total / pairs as f64).clamp(0.0, 1.0)
}

fn technical_depth(text: &str) -> f64 {
    saturate(count_distinct_terms(text, TECHNICAL_TERMS), TECHNICAL_DEPTH_CAP)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::TopicsConfig;
    use crate::embedding::{Encoder, HashingEncoder};

    #[test]
    fn dispersion_of_one_hot_is_near_one() {
        let mut v = vec![0.0f32; 768];
        v[3] = 2.0;
        let score = normalized_dispersion(&v);
        assert!(score > 0.99 && score <= 1.0, "{}", score);
    }

    #[test]
    fn dispersion_of_flat_vector_is_zero() {
        assert!(normalized_dispersion(&[0.5f32; 64]) < 1e-9);
        assert_eq!(normalized_dispersion(&[0.0f32; 64]), 0.0);
        assert_eq!(normalized_dispersion(&[]), 0.0);
    }

    #[test]
    fn identical_sentences_are_fully_coherent() {
        let v = vec![vec![1.0f32, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]];
        assert!((mean_pairwise_similarity(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn opposing_sentences_clamp_to_zero() {
        let v = vec![vec![1.0f32, 0.0], vec![-1.0, 0.0]];
        assert_eq!(mean_pairwise_similarity(&v), 0.0);
    }

    #[test]
    fn depth_saturates_past_cap() {
        let text = TECHNICAL_TERMS.join(" ");
        assert_eq!(technical_depth(&text), 1.0);

        let some = TECHNICAL_TERMS[..25].join(" ");
        assert!((technical_depth(&some) - 0.25).abs() < 1e-12);
    }

    #[tokio::test]
    async fn score_blends_title_abstract_and_content() {
        let encoder: Arc<dyn Encoder> = Arc::new(HashingEncoder::new(256));
        let models = ModelRegistry::from_encoders(
            encoder.clone(),
            encoder.clone(),
            encoder,
            TopicsConfig::default(),
        );
        let input = AnalysisInput {
            title: "Gradient descent".into(),
            abstract_text: "A neural network trained on a benchmark.".into(),
            content: "Single sentence without a terminator".into(),
            keywords: vec![],
        };

        let quality = score(&models, &input).await.unwrap();
        assert!(quality.clarity > 0.0 && quality.clarity <= 1.0);
        assert_eq!(quality.coherence, SHORT_CONTENT_COHERENCE);
        assert!(quality.technical_depth > 0.0);
    }
}
