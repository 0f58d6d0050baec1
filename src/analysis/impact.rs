//! Impact-potential scoring.

use anyhow::Result;

use super::text::{count_distinct_terms, saturate, words, PRACTICAL_CUES};
use super::{AnalysisInput, ImpactPotential};
use crate::embedding::{cosine_similarity, encode_one};
use crate::registry::ModelRegistry;

pub async fn score(models: &ModelRegistry, input: &AnalysisInput) -> Result<ImpactPotential> {
    let v = encode_one(models.general.as_ref(), &input.global_text()).await?;
    let anchor = models.impact_anchor().await?;

    let academic = if v.iter().all(|x| *x == 0.0) {
        0.0
    } else {
        (cosine_similarity(&v, anchor) as f64 + 1.0) / 2.0
    };

    let practical = saturate(
        count_distinct_terms(&format!("{} {}", input.abstract_text, input.content), PRACTICAL_CUES),
        5,
    );

    Ok(ImpactPotential::new(academic, practical, citation_potential(input)))
}

fn citation_potential(input: &AnalysisInput) -> f64 {
    0.5 * saturate(input.distinct_keywords(), 5) + 0.5 * saturate(words(&input.abstract_text).len(), 200)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citation_potential_combines_keywords_and_abstract_length() {
        let input = AnalysisInput {
            abstract_text: "word ".repeat(100),
            keywords: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into(), "f".into()],
            ..AnalysisInput::default()
        };
        assert!((citation_potential(&input) - 0.75).abs() < 1e-12);
        assert_eq!(citation_potential(&AnalysisInput::default()), 0.0);
    }
}
