//! Methodology detection and rigor scoring. Purely lexical.

use anyhow::Result;

use super::text::{count_distinct_terms, saturate, METHODOLOGY_PATTERNS, RIGOR_CUES, VALIDATION_CUES};
use super::{AnalysisInput, Methodology};

pub fn score(input: &AnalysisInput) -> Result<Methodology> {
    let content = &input.content;
    let robustness = saturate(count_distinct_terms(content, RIGOR_CUES), 5);
    let validation = saturate(count_distinct_terms(content, VALIDATION_CUES), 4);
    Ok(Methodology::new(detect_types(content), robustness, validation))
}

/// Labels whose cue words occur in `content`, in fixed label order.
pub fn detect_types(content: &str) -> Vec<String> {
    METHODOLOGY_PATTERNS
        .iter()
        .filter(|(_, cues)| count_distinct_terms(content, cues) > 0)
        .map(|(label, _)| label.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_labels_in_order() {
        let content = "A survey of respondents, then a Monte Carlo simulation and a regression.";
        assert_eq!(detect_types(content), vec!["survey", "simulation", "statistical"]);
        assert!(detect_types("").is_empty());
    }

    #[test]
    fn rigor_and_validation_saturate() {
        let input = AnalysisInput {
            content: "Randomized, controlled, blinded, replicated against a baseline. \
                Cross-validation on a held-out test set with a benchmark."
                .into(),
            ..AnalysisInput::default()
        };
        let m = score(&input).unwrap();
        assert_eq!(m.robustness, 1.0);
        assert_eq!(m.validation, 1.0);
        assert_eq!(m.overall_methodology, 1.0);
    }

    #[test]
    fn phrase_cues_ignore_word_fragments() {
        let input = AnalysisInput {
            content: "A showcase study under contest settings.".into(),
            ..AnalysisInput::default()
        };
        assert!(detect_types(&input.content).is_empty());
        assert_eq!(score(&input).unwrap().validation, 0.0);
    }
}
