//! Domain records: papers, categories, tags, and the read models derived
//! from them.
//!
//! Papers carry the three analysis artifacts (score bundle, embedding,
//! topic distribution) alongside their bibliographic metadata. Categories
//! and tags are many-to-many with papers and referenced by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::{AnalysisInput, AnalysisResult};
use crate::topics::TopicDistribution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaperStatus {
    #[default]
    Draft,
    Published,
    UnderReview,
}

impl PaperStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperStatus::Draft => "draft",
            PaperStatus::Published => "published",
            PaperStatus::UnderReview => "under_review",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(PaperStatus::Draft),
            "published" => Some(PaperStatus::Published),
            "under_review" => Some(PaperStatus::UnderReview),
            _ => None,
        }
    }
}

/// Author entry. Both fields are required when a paper is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Author {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub affiliation: String,
}

/// A stored research paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub id: i64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub content: String,
    pub status: PaperStatus,
    pub keywords: Vec<String>,
    pub authors: Vec<Author>,
    pub doi: Option<String>,
    pub citations: i64,
    pub impact_factor: Option<f64>,
    pub h_index: Option<f64>,
    pub publication_date: DateTime<Utc>,
    pub category_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
    #[serde(rename = "analysis_results")]
    pub analysis: Option<AnalysisResult>,
    #[serde(rename = "topic_distribution")]
    pub topics: TopicDistribution,
    /// Not serialized; exposed through similarity search only.
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Paper {
    pub fn analysis_input(&self) -> AnalysisInput {
        AnalysisInput {
            title: self.title.clone(),
            abstract_text: self.abstract_text.clone(),
            content: self.content.clone(),
            keywords: self.keywords.clone(),
        }
    }
}

/// Create payload.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewPaper {
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

/// Partial update payload. `None` leaves a field unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaperUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub authors: Option<Vec<Author>>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub category_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub tag_ids: Option<Vec<i64>>,
}

impl PaperUpdate {
    /// True when a field that analysis reads is being changed.
    pub fn touches_analyzed_text(&self) -> bool {
        self.title.is_some() || self.abstract_text.is_some() || self.content.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: Option<String>,
    /// Number of papers carrying this tag, computed on read.
    pub usage_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewTag {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// URL-safe form of a tag name: lowercase, spaces to hyphens, other
/// punctuation dropped, hyphen runs collapsed, edges trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().to_lowercase().chars() {
        let c = if c.is_whitespace() { '-' } else { c };
        if c == '-' {
            if !slug.ends_with('-') {
                slug.push('-');
            }
        } else if c.is_alphanumeric() {
            slug.push(c);
        }
    }
    slug.trim_matches('-').to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationMetrics {
    pub total_citations: i64,
    pub h_index: Option<f64>,
    pub impact_factor: Option<f64>,
    /// Year → citation count. Empty until a citation source is wired in.
    pub citations_per_year: BTreeMap<i32, i64>,
}

impl From<&Paper> for CitationMetrics {
    fn from(paper: &Paper) -> Self {
        Self {
            total_citations: paper.citations,
            h_index: paper.h_index,
            impact_factor: paper.impact_factor,
            citations_per_year: BTreeMap::new(),
        }
    }
}

/// A nearest-neighbour hit for the similar-papers query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarPaper {
    pub id: i64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub similarity_score: f64,
}

/// Query parameters for listing papers.
#[derive(Debug, Clone, Default)]
pub struct PaperFilter {
    pub skip: i64,
    pub limit: i64,
    /// Category name to restrict to.
    pub category: Option<String>,
    /// Restrict to these ids, in this order.
    pub ids: Option<Vec<i64>>,
}
