//! Single-document topic extraction.
//!
//! A TF-IDF vectorizer and a batch variational-Bayes LDA model are fitted
//! on the one input text, then the document's topic weights and each
//! topic's strongest terms are reported. Because the model is refit per
//! call, topics are not comparable across documents. The RNG is seeded from
//! [`TopicsConfig::seed`], so the same text always yields the same topics.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use statrs::function::gamma::digamma;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::config::TopicsConfig;

/// One topic's top terms and the document's weight for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub words: Vec<String>,
    pub weight: f64,
}

/// Topic index, written as `topic_<i>`.
///
/// Orders by index, so `topic_2` sorts before `topic_10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopicKey(pub usize);

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("topic_{}", self.0))
    }
}

impl FromStr for TopicKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.strip_prefix("topic_")
            .and_then(|n| n.parse().ok())
            .map(TopicKey)
            .ok_or_else(|| format!("invalid topic key '{}'", s))
    }
}

impl Serialize for TopicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TopicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// [`TopicKey`] → [`Topic`], in index order.
pub type TopicDistribution = BTreeMap<TopicKey, Topic>;

const EPS: f64 = f64::EPSILON;
const MAX_DOC_UPDATE_ITER: usize = 100;
const MEAN_CHANGE_TOL: f64 = 1e-3;

pub fn extract_topics(text: &str, settings: &TopicsConfig) -> Result<TopicDistribution> {
    let (vocabulary, weights) = tfidf(text, settings.max_features);
    if vocabulary.is_empty() {
        return Ok(TopicDistribution::new());
    }

    let doc: Vec<(usize, f64)> = weights.into_iter().enumerate().collect();
    let mut lda = Lda::new(settings.n_topics, vocabulary.len(), settings.seed)?;
    lda.fit(&doc, settings.max_iter)?;
    let doc_topics = lda.transform(&doc);

    let mut topics = TopicDistribution::new();
    for (k, row) in lda.components.iter().enumerate() {
        let mut order: Vec<usize> = (0..row.len()).collect();
        order.sort_by(|a, b| row[*b].total_cmp(&row[*a]).then(a.cmp(b)));
        let words = order
            .into_iter()
            .take(settings.top_words)
            .map(|i| vocabulary[i].clone())
            .collect();
        topics.insert(
            TopicKey(k),
            Topic {
                words,
                weight: doc_topics[k],
            },
        );
    }
    Ok(topics)
}

/// Lowercased tokens of two or more word characters.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

/// Vocabulary (alphabetical) and L2-normalised TF-IDF weights.
///
/// With a single document every smoothed idf is 1, so the weights are the
/// normalised term counts.
fn tfidf(text: &str, max_features: usize) -> (Vec<String>, Vec<f64>) {
    let stop: HashSet<&str> = ENGLISH_STOP_WORDS.iter().copied().collect();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in tokenize(text) {
        if !stop.contains(token.as_str()) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }

    let mut terms: Vec<(String, usize)> = counts.into_iter().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    terms.truncate(max_features);
    terms.sort_by(|a, b| a.0.cmp(&b.0));

    let norm = terms
        .iter()
        .map(|(_, c)| (*c as f64).powi(2))
        .sum::<f64>()
        .sqrt();
    let weights = terms.iter().map(|(_, c)| *c as f64 / norm).collect();
    let vocabulary = terms.into_iter().map(|(t, _)| t).collect();
    (vocabulary, weights)
}

/// `exp(digamma(x) - digamma(sum(x)))` for one row.
fn dirichlet_expectation(row: &[f64]) -> Vec<f64> {
    let total = digamma(row.iter().sum());
    row.iter().map(|x| (digamma(*x) - total).exp()).collect()
}

struct Lda {
    n_topics: usize,
    /// Doc-topic and topic-word prior, both `1 / n_topics`.
    prior: f64,
    /// Topic-word variational parameters, `n_topics × n_terms`.
    components: Vec<Vec<f64>>,
    exp_dirichlet_component: Vec<Vec<f64>>,
    rng: StdRng,
    init: Gamma<f64>,
}

impl Lda {
    fn new(n_topics: usize, n_terms: usize, seed: u64) -> Result<Self> {
        let init = Gamma::new(100.0, 0.01)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let components: Vec<Vec<f64>> = (0..n_topics)
            .map(|_| (0..n_terms).map(|_| init.sample(&mut rng)).collect())
            .collect();
        let exp_dirichlet_component = components.iter().map(|r| dirichlet_expectation(r)).collect();
        Ok(Self {
            n_topics,
            prior: 1.0 / n_topics as f64,
            components,
            exp_dirichlet_component,
            rng,
            init,
        })
    }

    fn fit(&mut self, doc: &[(usize, f64)], max_iter: usize) -> Result<()> {
        for _ in 0..max_iter {
            let start: Vec<f64> = (0..self.n_topics)
                .map(|_| self.init.sample(&mut self.rng))
                .collect();
            let (_, sstats) = self.e_step(doc, start, true);
            let sstats = sstats.ok_or_else(|| anyhow::anyhow!("topic model produced no statistics"))?;

            for k in 0..self.n_topics {
                for (j, s) in sstats[k].iter().enumerate() {
                    self.components[k][j] = self.prior + s * self.exp_dirichlet_component[k][j];
                }
            }
            self.exp_dirichlet_component = self
                .components
                .iter()
                .map(|r| dirichlet_expectation(r))
                .collect();
        }
        Ok(())
    }

    /// Normalised topic weights for `doc`.
    fn transform(&self, doc: &[(usize, f64)]) -> Vec<f64> {
        let (gamma, _) = self.e_step(doc, vec![1.0; self.n_topics], false);
        let total: f64 = gamma.iter().sum();
        gamma.iter().map(|g| g / total).collect()
    }

    fn e_step(
        &self,
        doc: &[(usize, f64)],
        mut doc_topic: Vec<f64>,
        cal_sstats: bool,
    ) -> (Vec<f64>, Option<Vec<Vec<f64>>>) {
        let k = self.n_topics;
        let mut exp_doc_topic = dirichlet_expectation(&doc_topic);

        let norm_phi = |exp_doc_topic: &[f64]| -> Vec<f64> {
            doc.iter()
                .map(|(id, _)| {
                    (0..k)
                        .map(|t| exp_doc_topic[t] * self.exp_dirichlet_component[t][*id])
                        .sum::<f64>()
                        + EPS
                })
                .collect()
        };

        for _ in 0..MAX_DOC_UPDATE_ITER {
            let last = doc_topic.clone();
            let phi = norm_phi(&exp_doc_topic);
            for t in 0..k {
                let dot: f64 = doc
                    .iter()
                    .zip(&phi)
                    .map(|((id, cnt), p)| self.exp_dirichlet_component[t][*id] * cnt / p)
                    .sum();
                doc_topic[t] = exp_doc_topic[t] * dot + self.prior;
            }
            exp_doc_topic = dirichlet_expectation(&doc_topic);

            let change = doc_topic
                .iter()
                .zip(&last)
                .map(|(a, b)| (a - b).abs())
                .sum::<f64>()
                / k as f64;
            if change < MEAN_CHANGE_TOL {
                break;
            }
        }

        if !cal_sstats {
            return (doc_topic, None);
        }

        let n_terms = self.components.first().map_or(0, Vec::len);
        let mut sstats = vec![vec![0.0; n_terms]; k];
        let phi = norm_phi(&exp_doc_topic);
        for t in 0..k {
            for ((id, cnt), p) in doc.iter().zip(&phi) {
                sstats[t][*id] += exp_doc_topic[t] * cnt / p;
            }
        }
        (doc_topic, Some(sstats))
    }
}

/// Stop words removed before vectorizing.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
    "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
    "amongst", "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone",
    "anything", "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became",
    "because", "become", "becomes", "becoming", "been", "before", "beforehand", "behind",
    "being", "below", "beside", "besides", "between", "beyond", "bill", "both", "bottom",
    "but", "by", "call", "can", "cannot", "cant", "co", "con", "could", "couldnt", "cry",
    "de", "describe", "detail", "do", "done", "down", "due", "during", "each", "eg",
    "eight", "either", "eleven", "else", "elsewhere", "empty", "enough", "etc", "even",
    "ever", "every", "everyone", "everything", "everywhere", "except", "few", "fifteen",
    "fifty", "fill", "find", "fire", "first", "five", "for", "former", "formerly", "forty",
    "found", "four", "from", "front", "full", "further", "get", "give", "go", "had", "has",
    "hasnt", "have", "he", "hence", "her", "here", "hereafter", "hereby", "herein",
    "hereupon", "hers", "herself", "him", "himself", "his", "how", "however", "hundred",
    "i", "ie", "if", "in", "inc", "indeed", "interest", "into", "is", "it", "its",
    "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd", "made", "many",
    "may", "me", "meanwhile", "might", "mill", "mine", "more", "moreover", "most", "mostly",
    "move", "much", "must", "my", "myself", "name", "namely", "neither", "never",
    "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
    "part", "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem",
    "seemed", "seeming", "seems", "serious", "several", "she", "should", "show", "side",
    "since", "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something",
    "sometime", "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than",
    "that", "the", "their", "them", "themselves", "then", "thence", "there", "thereafter",
    "thereby", "therefore", "therein", "thereupon", "these", "they", "thick", "thin",
    "third", "this", "those", "though", "three", "through", "throughout", "thru", "thus",
    "to", "together", "too", "top", "toward", "towards", "twelve", "twenty", "two", "un",
    "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were",
    "what", "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas",
    "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while", "whither",
    "who", "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without",
    "would", "yet", "you", "your", "yours", "yourself", "yourselves",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_drops_single_chars_and_splits_punctuation() {
        assert_eq!(
            tokenize("A GPU-based k-NN, in_place x2!"),
            vec!["gpu", "based", "nn", "in_place", "x2"]
        );
    }

    #[test]
    fn tfidf_is_sorted_and_normalised() {
        let (vocab, weights) = tfidf("graph graph model the of", 5000);
        assert_eq!(vocab, vec!["graph", "model"]);
        let norm: f64 = weights.iter().map(|w| w * w).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
        assert!(weights[0] > weights[1]);
    }

    #[test]
    fn max_features_keeps_most_frequent() {
        let (vocab, _) = tfidf("zeta zeta zeta alpha beta beta", 2);
        assert_eq!(vocab, vec!["beta", "zeta"]);
    }

    #[test]
    fn empty_vocabulary_yields_no_topics() {
        let topics = extract_topics("the of and a", &TopicsConfig::default()).unwrap();
        assert!(topics.is_empty());
        assert!(extract_topics("", &TopicsConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn reports_every_topic_with_normalised_weights() {
        let text = "Graph neural networks propagate messages between nodes. \
            Message passing on graphs generalises convolution to irregular domains.";
        let topics = extract_topics(text, &TopicsConfig::default()).unwrap();
        assert_eq!(topics.len(), 10);

        let total: f64 = topics.values().map(|t| t.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
        for topic in topics.values() {
            assert!(!topic.words.is_empty() && topic.words.len() <= 10);
            assert!(topic.weight >= 0.0);
        }
    }

    #[test]
    fn same_text_same_topics() {
        let text = "Sparse attention scales transformers to long documents.";
        let a = extract_topics(text, &TopicsConfig::default()).unwrap();
        let b = extract_topics(text, &TopicsConfig::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn top_words_limit_respected() {
        let text = (0..30).map(|i| format!("term{} ", i)).collect::<String>();
        let settings = TopicsConfig {
            top_words: 3,
            ..TopicsConfig::default()
        };
        let topics = extract_topics(&text, &settings).unwrap();
        assert!(topics.values().all(|t| t.words.len() == 3));
    }

    #[test]
    fn keys_order_numerically_past_ten_topics() {
        let settings = TopicsConfig {
            n_topics: 12,
            ..TopicsConfig::default()
        };
        let text = "sparse attention scales transformers to long documents with linear memory";
        let topics = extract_topics(text, &settings).unwrap();

        let names: Vec<String> = topics.keys().map(|k| k.to_string()).collect();
        let expected: Vec<String> = (0..12).map(|k| format!("topic_{}", k)).collect();
        assert_eq!(names, expected);

        let json = serde_json::to_string(&topics).unwrap();
        assert!(json.find("\"topic_2\"").unwrap() < json.find("\"topic_10\"").unwrap());
        let back: TopicDistribution = serde_json::from_str(&json).unwrap();
        assert!(back.keys().eq(topics.keys()));
    }

    #[test]
    fn topic_keys_reject_other_names() {
        assert_eq!("topic_7".parse::<TopicKey>(), Ok(TopicKey(7)));
        assert!("topic_".parse::<TopicKey>().is_err());
        assert!("cluster_1".parse::<TopicKey>().is_err());
        assert_eq!(format!("{:<9}|", TopicKey(3)), "topic_3  |");
    }
}
