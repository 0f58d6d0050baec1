//! Lexical helpers shared by the scoring sub-routines.

use std::collections::HashSet;

/// Splits text into sentences on `.`, `!`, and `?`, dropping fragments that
/// are empty or whitespace-only. `"short text."` is one sentence.
pub fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lowercased words with surrounding punctuation stripped.
///
/// Inner hyphens and apostrophes survive, so `"state-of-the-art,"` yields
/// `"state-of-the-art"`.
pub fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Number of distinct entries of `vocabulary` found in `text`.
///
/// Entries match on word boundaries only. A multi-word entry must appear as
/// a run of adjacent words, so `"contest settings"` does not contain
/// `"test set"`. Hyphenated entries are single words.
pub fn count_distinct_terms(text: &str, vocabulary: &[&str]) -> usize {
    let tokens = words(text);
    let single: HashSet<&str> = tokens.iter().map(String::as_str).collect();

    vocabulary
        .iter()
        .filter(|term| {
            let parts = words(term);
            match parts.len() {
                0 => false,
                1 => single.contains(parts[0].as_str()),
                n => tokens.windows(n).any(|w| w == parts.as_slice()),
            }
        })
        .count()
}

/// Saturating ratio `min(1, count / cap)`.
pub fn saturate(count: usize, cap: usize) -> f64 {
    if cap == 0 {
        return 0.0;
    }
    (count as f64 / cap as f64).min(1.0)
}

/// Arithmetic mean; `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Technical vocabulary used by the technical-depth metric.
///
/// More than one hundred entries so that depth can saturate at 1.0.
pub const TECHNICAL_TERMS: &[&str] = &[
    "algorithm", "methodology", "framework", "analysis", "model", "system", "data",
    "research", "study", "implementation", "results", "performance", "evaluation",
    "hypothesis", "experiment", "dataset", "baseline", "benchmark", "accuracy",
    "precision", "recall", "regression", "classification", "clustering", "optimization",
    "gradient", "convergence", "complexity", "architecture", "parameter", "hyperparameter",
    "inference", "estimation", "probability", "distribution", "variance", "covariance",
    "correlation", "entropy", "likelihood", "bayesian", "stochastic", "deterministic",
    "heuristic", "simulation", "validation", "verification", "protocol", "latency",
    "throughput", "scalability", "robustness", "generalization", "overfitting",
    "regularization", "embedding", "transformer", "attention", "encoder", "decoder",
    "neural", "network", "kernel", "matrix", "vector", "tensor", "eigenvalue",
    "theorem", "lemma", "proof", "corollary", "axiom", "formalism", "topology",
    "manifold", "graph", "node", "vertex", "edge", "traversal", "recursion",
    "concurrency", "parallelism", "synchronization", "distributed", "consensus",
    "fault", "compiler", "runtime", "memory", "cache", "database", "query", "index",
    "schema", "pipeline", "preprocessing", "feature", "sampling", "interpolation",
    "quantization", "compression", "encryption", "signal", "spectrum", "frequency",
    "calibration", "metric", "ablation", "empirical", "quantitative", "qualitative",
    "statistical", "significance", "coefficient", "polynomial", "differential",
    "integral", "approximation", "numerical", "discretization", "finite", "asymptotic",
    "invariant", "constraint", "objective", "loss", "reinforcement", "supervised",
    "unsupervised", "annotation", "corpus", "token", "semantic", "syntactic",
];

/// Cue words signalling a claim of novelty.
pub const INNOVATION_CUES: &[&str] = &[
    "novel", "new", "first", "propose", "proposes", "proposed", "introduce",
    "introduces", "introduced", "innovative", "pioneering", "unprecedented",
    "outperform", "outperforms", "state-of-the-art", "breakthrough", "unlike",
    "improves", "advance", "original",
];

/// Cue words signalling methodological rigor.
pub const RIGOR_CUES: &[&str] = &[
    "sample size", "control group", "randomized", "randomised", "baseline",
    "ablation", "replicate", "replicated", "replication", "controlled",
    "blinded", "power analysis", "preregistered", "confound", "confounding",
    "sensitivity analysis", "systematic",
];

/// Cue words signalling validation of results.
pub const VALIDATION_CUES: &[&str] = &[
    "validation", "validated", "cross-validation", "holdout", "held-out",
    "test set", "benchmark", "reproducible", "reproducibility", "p-value",
    "confidence interval", "statistically significant", "peer-reviewed",
    "ground truth", "verified",
];

/// Cue words signalling real-world applicability.
pub const PRACTICAL_CUES: &[&str] = &[
    "application", "applications", "deploy", "deployed", "deployment", "industry",
    "industrial", "real-world", "practical", "practitioners", "clinical",
    "production", "open-source", "tool", "toolkit", "cost", "users", "commercial",
];

/// Methodology labels and the cue words that detect them, in report order.
pub const METHODOLOGY_PATTERNS: &[(&str, &[&str])] = &[
    ("experimental", &["experiment", "experiments", "experimental", "controlled trial", "treatment group"]),
    ("survey", &["survey", "questionnaire", "respondents", "likert"]),
    ("case_study", &["case study", "case studies"]),
    ("simulation", &["simulation", "simulated", "monte carlo"]),
    ("theoretical", &["theorem", "proof", "lemma", "formal model"]),
    ("statistical", &["regression", "anova", "p-value", "hypothesis test", "statistical"]),
    ("machine_learning", &["neural", "training set", "trained", "deep learning", "machine learning"]),
    ("qualitative", &["interview", "interviews", "thematic", "ethnography", "focus group"]),
    ("literature_review", &["literature review", "systematic review", "meta-analysis"]),
];
