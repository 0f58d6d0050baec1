//! Novelty scoring: distance from boilerplate and claims of originality.

use anyhow::Result;

use super::text::{count_distinct_terms, saturate, INNOVATION_CUES};
use super::{AnalysisInput, Novelty};
use crate::embedding::{cosine_similarity, encode_one};
use crate::registry::ModelRegistry;

pub async fn score(models: &ModelRegistry, input: &AnalysisInput) -> Result<Novelty> {
    let global = input.global_text();
    let v = encode_one(models.sentence.as_ref(), &global).await?;
    let anchor = models.generic_anchor().await?;

    let uniqueness = if v.iter().all(|x| *x == 0.0) {
        0.0
    } else {
        1.0 - cosine_similarity(&v, anchor) as f64
    };

    Ok(Novelty::new(uniqueness, innovation(&global, input.distinct_keywords())))
}

fn innovation(global: &str, keywords: usize) -> f64 {
    0.7 * saturate(count_distinct_terms(global, INNOVATION_CUES), 5) + 0.3 * saturate(keywords, 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn innovation_blends_cues_and_keywords() {
        assert_eq!(innovation("", 0), 0.0);
        let text = "We propose a novel method that outperforms the state-of-the-art, the first of its kind.";
        assert!((innovation(text, 10) - 1.0).abs() < 1e-12);
        assert!((innovation("a novel idea", 0) - 0.7 * 0.2).abs() < 1e-12);
    }
}
