//! Research-analysis pipeline.
//!
//! [`Analyzer::analyze`] runs four independent scoring sub-routines
//! concurrently and combines them with a fixed weighted sum:
//!
//! | Dimension | Record | Weight |
//! |-----------|--------|--------|
//! | content quality | [`ContentQuality`] | 0.30 |
//! | novelty | [`Novelty`] | 0.25 |
//! | methodology | [`Methodology`] | 0.25 |
//! | impact potential | [`ImpactPotential`] | 0.20 |
//!
//! Every metric is clamped to `[0, 1]` when its record is built, so the
//! overall score is in `[0, 1]` as well. Any encoder failure fails the whole
//! call; there are no partial results and no retries at this layer.
//!
//! The analyzer also produces the two other per-paper artifacts: the
//! embedding vector ([`Analyzer::generate_embedding`]) and the topic
//! distribution ([`Analyzer::extract_topics`]).

pub mod impact;
pub mod methodology;
pub mod novelty;
pub mod quality;
pub mod text;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::embedding::encode_one;
use crate::registry::ModelRegistry;
use crate::topics::{self, TopicDistribution};

pub const QUALITY_WEIGHT: f64 = 0.30;
pub const NOVELTY_WEIGHT: f64 = 0.25;
pub const METHODOLOGY_WEIGHT: f64 = 0.25;
pub const IMPACT_WEIGHT: f64 = 0.20;

/// The text fields of a paper that analysis reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl AnalysisInput {
    /// `"{title} {abstract}"`, the span used where global context matters.
    pub fn global_text(&self) -> String {
        format!("{} {}", self.title, self.abstract_text)
    }

    /// Title, abstract, and content together.
    pub fn full_text(&self) -> String {
        format!("{} {} {}", self.title, self.abstract_text, self.content)
    }

    /// Number of distinct non-blank keywords, ignoring case.
    pub fn distinct_keywords(&self) -> usize {
        let mut seen: Vec<String> = self
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        seen.sort();
        seen.dedup();
        seen.len()
    }
}

/// Clamps to `[0, 1]`, mapping NaN to 0.
pub(crate) fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentQuality {
    pub clarity: f64,
    pub coherence: f64,
    pub technical_depth: f64,
    pub overall_quality: f64,
}

impl ContentQuality {
    pub fn new(clarity: f64, coherence: f64, technical_depth: f64) -> Self {
        let (clarity, coherence, technical_depth) = (unit(clarity), unit(coherence), unit(technical_depth));
        Self {
            clarity,
            coherence,
            technical_depth,
            overall_quality: text::mean(&[clarity, coherence, technical_depth]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Novelty {
    pub uniqueness: f64,
    pub innovation: f64,
    pub overall_novelty: f64,
}

impl Novelty {
    pub fn new(uniqueness: f64, innovation: f64) -> Self {
        let (uniqueness, innovation) = (unit(uniqueness), unit(innovation));
        Self {
            uniqueness,
            innovation,
            overall_novelty: text::mean(&[uniqueness, innovation]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Methodology {
    pub methodology_types: Vec<String>,
    pub robustness: f64,
    pub validation: f64,
    pub overall_methodology: f64,
}

impl Methodology {
    pub fn new(methodology_types: Vec<String>, robustness: f64, validation: f64) -> Self {
        let (robustness, validation) = (unit(robustness), unit(validation));
        Self {
            methodology_types,
            robustness,
            validation,
            overall_methodology: text::mean(&[robustness, validation]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactPotential {
    pub academic_impact: f64,
    pub practical_impact: f64,
    pub citation_potential: f64,
    pub overall_impact: f64,
}

impl ImpactPotential {
    pub fn new(academic_impact: f64, practical_impact: f64, citation_potential: f64) -> Self {
        let (academic_impact, practical_impact, citation_potential) = (
            unit(academic_impact),
            unit(practical_impact),
            unit(citation_potential),
        );
        Self {
            academic_impact,
            practical_impact,
            citation_potential,
            overall_impact: text::mean(&[academic_impact, practical_impact, citation_potential]),
        }
    }
}

/// One scoring dimension's result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dimension", rename_all = "snake_case")]
pub enum SubScore {
    ContentQuality(ContentQuality),
    Novelty(Novelty),
    Methodology(Methodology),
    ImpactPotential(ImpactPotential),
}

impl SubScore {
    pub fn name(&self) -> &'static str {
        match self {
            SubScore::ContentQuality(_) => "content_quality",
            SubScore::Novelty(_) => "novelty",
            SubScore::Methodology(_) => "methodology",
            SubScore::ImpactPotential(_) => "impact_potential",
        }
    }

    /// The record's aggregate metric.
    pub fn overall(&self) -> f64 {
        match self {
            SubScore::ContentQuality(q) => q.overall_quality,
            SubScore::Novelty(n) => n.overall_novelty,
            SubScore::Methodology(m) => m.overall_methodology,
            SubScore::ImpactPotential(i) => i.overall_impact,
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            SubScore::ContentQuality(_) => QUALITY_WEIGHT,
            SubScore::Novelty(_) => NOVELTY_WEIGHT,
            SubScore::Methodology(_) => METHODOLOGY_WEIGHT,
            SubScore::ImpactPotential(_) => IMPACT_WEIGHT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub content_quality: ContentQuality,
    pub novelty: Novelty,
    pub methodology: Methodology,
    pub impact_potential: ImpactPotential,
    pub overall_score: f64,
}

impl AnalysisResult {
    pub fn from_parts(
        content_quality: ContentQuality,
        novelty: Novelty,
        methodology: Methodology,
        impact_potential: ImpactPotential,
    ) -> Self {
        let mut result = Self {
            content_quality,
            novelty,
            methodology,
            impact_potential,
            overall_score: 0.0,
        };
        result.overall_score = aggregate(&result.sub_scores());
        result
    }

    /// The four records in weight order.
    pub fn sub_scores(&self) -> [SubScore; 4] {
        [
            SubScore::ContentQuality(self.content_quality.clone()),
            SubScore::Novelty(self.novelty.clone()),
            SubScore::Methodology(self.methodology.clone()),
            SubScore::ImpactPotential(self.impact_potential.clone()),
        ]
    }
}

/// Weighted sum over exactly the four dimensions.
pub fn aggregate(scores: &[SubScore; 4]) -> f64 {
    unit(scores.iter().map(|s| s.weight() * s.overall()).sum())
}

/// Entry point for all per-paper inference.
#[derive(Clone)]
pub struct Analyzer {
    models: Arc<ModelRegistry>,
}

impl Analyzer {
    pub fn new(models: Arc<ModelRegistry>) -> Self {
        Self { models }
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Scores a paper on all four dimensions.
    pub async fn analyze(&self, input: &AnalysisInput) -> Result<AnalysisResult> {
        let (quality, novelty, methodology, impact) = tokio::try_join!(
            self.analyze_content_quality(input),
            self.analyze_novelty(input),
            self.analyze_methodology(input),
            self.analyze_impact_potential(input),
        )?;

        let result = AnalysisResult::from_parts(quality, novelty, methodology, impact);
        for score in result.sub_scores() {
            tracing::trace!(
                dimension = score.name(),
                overall = score.overall(),
                weight = score.weight(),
                "dimension scored"
            );
        }
        tracing::debug!(
            title = %input.title,
            overall = result.overall_score,
            "analysis complete"
        );
        Ok(result)
    }

    pub async fn analyze_content_quality(&self, input: &AnalysisInput) -> Result<ContentQuality> {
        quality::score(&self.models, input).await
    }

    pub async fn analyze_novelty(&self, input: &AnalysisInput) -> Result<Novelty> {
        novelty::score(&self.models, input).await
    }

    pub async fn analyze_methodology(&self, input: &AnalysisInput) -> Result<Methodology> {
        methodology::score(input)
    }

    pub async fn analyze_impact_potential(&self, input: &AnalysisInput) -> Result<ImpactPotential> {
        impact::score(&self.models, input).await
    }

    /// One forward pass through the sentence encoder.
    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        encode_one(self.models.sentence.as_ref(), text).await
    }

    /// Fits the topic model on `text` alone and reports its topics.
    pub async fn extract_topics(&self, text: &str) -> Result<TopicDistribution> {
        let settings = self.models.topics.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || topics::extract_topics(&text, &settings)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopicsConfig;
    use crate::embedding::{DisabledEncoder, Encoder, HashingEncoder};

    fn hashing_analyzer() -> Analyzer {
        let encoder: Arc<dyn Encoder> = Arc::new(HashingEncoder::new(768));
        Analyzer::new(Arc::new(ModelRegistry::from_encoders(
            encoder.clone(),
            encoder.clone(),
            encoder,
            TopicsConfig::default(),
        )))
    }

    fn paper() -> AnalysisInput {
        AnalysisInput {
            title: "Sparse attention for long-document classification".into(),
            abstract_text: "We propose a novel sparse attention mechanism and evaluate it \
                on three benchmark datasets, where it outperforms strong baselines."
                .into(),
            content: "We ran controlled experiments with a randomized baseline. \
                Validation used a held-out test set and 5-fold cross-validation. \
                The model was trained with a neural transformer encoder. \
                Results are reproducible and the toolkit is open-source for practitioners."
                .into(),
            keywords: vec!["attention".into(), "NLP".into(), "efficiency".into()],
        }
    }

    fn in_unit(v: f64) -> bool {
        (0.0..=1.0).contains(&v)
    }

    #[test]
    fn weights_sum_to_one() {
        let total = QUALITY_WEIGHT + NOVELTY_WEIGHT + METHODOLOGY_WEIGHT + IMPACT_WEIGHT;
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn records_clamp_out_of_range_inputs() {
        let q = ContentQuality::new(1.7, -0.2, f64::NAN);
        assert_eq!((q.clarity, q.coherence, q.technical_depth), (1.0, 0.0, 0.0));
        assert!((q.overall_quality - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn aggregate_uses_fixed_weights() {
        let result = AnalysisResult::from_parts(
            ContentQuality::new(1.0, 1.0, 1.0),
            Novelty::new(0.0, 0.0),
            Methodology::new(vec![], 1.0, 1.0),
            ImpactPotential::new(0.5, 0.5, 0.5),
        );
        assert!((result.overall_score - (0.30 + 0.25 + 0.10)).abs() < 1e-12);
    }

    #[test]
    fn sub_scores_report_names_in_order() {
        let result = AnalysisResult::from_parts(
            ContentQuality::new(0.1, 0.2, 0.3),
            Novelty::new(0.4, 0.5),
            Methodology::new(vec!["survey".into()], 0.6, 0.7),
            ImpactPotential::new(0.8, 0.9, 1.0),
        );
        let names: Vec<&str> = result.sub_scores().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["content_quality", "novelty", "methodology", "impact_potential"]);
    }

    #[test]
    fn serializes_with_original_field_names() {
        let result = AnalysisResult::from_parts(
            ContentQuality::new(0.5, 0.5, 0.5),
            Novelty::new(0.5, 0.5),
            Methodology::new(vec!["experimental".into()], 0.5, 0.5),
            ImpactPotential::new(0.5, 0.5, 0.5),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["content_quality"]["overall_quality"].is_number());
        assert!(json["novelty"]["overall_novelty"].is_number());
        assert_eq!(json["methodology"]["methodology_types"][0], "experimental");
        assert!(json["impact_potential"]["overall_impact"].is_number());
        assert!((json["overall_score"].as_f64().unwrap() - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn all_metrics_bounded() {
        let result = hashing_analyzer().analyze(&paper()).await.unwrap();
        let q = &result.content_quality;
        let n = &result.novelty;
        let m = &result.methodology;
        let i = &result.impact_potential;
        for v in [
            q.clarity, q.coherence, q.technical_depth, q.overall_quality,
            n.uniqueness, n.innovation, n.overall_novelty,
            m.robustness, m.validation, m.overall_methodology,
            i.academic_impact, i.practical_impact, i.citation_potential, i.overall_impact,
            result.overall_score,
        ] {
            assert!(in_unit(v), "metric out of range: {}", v);
        }
    }

    #[tokio::test]
    async fn analysis_is_deterministic() {
        let analyzer = hashing_analyzer();
        let a = analyzer.analyze(&paper()).await.unwrap();
        let b = analyzer.analyze(&paper()).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn short_content_end_to_end() {
        let input = AnalysisInput {
            title: "X".into(),
            abstract_text: "Y".into(),
            content: "short text.".into(),
            keywords: vec![],
        };
        let result = hashing_analyzer().analyze(&input).await.unwrap();
        assert_eq!(result.content_quality.coherence, 0.8);

        let expected = 0.30 * result.content_quality.overall_quality
            + 0.25 * result.novelty.overall_novelty
            + 0.25 * result.methodology.overall_methodology
            + 0.20 * result.impact_potential.overall_impact;
        assert!((result.overall_score - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn empty_fields_do_not_error() {
        let result = hashing_analyzer()
            .analyze(&AnalysisInput::default())
            .await
            .unwrap();
        assert_eq!(result.content_quality.coherence, 0.8);
        assert_eq!(result.content_quality.technical_depth, 0.0);
        assert!(result.methodology.methodology_types.is_empty());
    }

    #[tokio::test]
    async fn one_failing_model_fails_the_call() {
        let ok: Arc<dyn Encoder> = Arc::new(HashingEncoder::new(64));
        let analyzer = Analyzer::new(Arc::new(ModelRegistry::from_encoders(
            ok.clone(),
            ok,
            Arc::new(DisabledEncoder),
            TopicsConfig::default(),
        )));
        assert!(analyzer.analyze(&paper()).await.is_err());
    }

    #[tokio::test]
    async fn embedding_matches_sentence_dims() {
        let v = hashing_analyzer()
            .generate_embedding("Sparse attention for long documents")
            .await
            .unwrap();
        assert_eq!(v.len(), 768);
    }

    #[tokio::test]
    async fn topics_come_back_keyed_by_index() {
        let topics = hashing_analyzer()
            .extract_topics("graph neural networks learn graph structure from node features")
            .await
            .unwrap();
        assert_eq!(topics.len(), 10);
        assert!(topics.contains_key(&topics::TopicKey(0)));
    }

    #[test]
    fn distinct_keywords_ignores_case_and_blanks() {
        let input = AnalysisInput {
            keywords: vec!["ML".into(), "ml".into(), " ".into(), "Graphs".into()],
            ..AnalysisInput::default()
        };
        assert_eq!(input.distinct_keywords(), 2);
    }
}
