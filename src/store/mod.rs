//! Storage abstraction for papers, categories, tags, and the search index.
//!
//! The [`Store`] trait is the only way the service touches persistence.
//! Two backends implement it:
//!
//! - [`SqliteStore`](sqlite::SqliteStore): relational tables plus an FTS5
//!   table and a vector table for search.
//! - [`InMemoryStore`](memory::InMemoryStore): maps behind `RwLock`s with
//!   brute-force search, for tests.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`insert_paper`](Store::insert_paper) | Store a new paper, returning its id |
//! | [`update_paper`](Store::update_paper) | Overwrite a stored paper |
//! | [`list_papers`](Store::list_papers) | Page through papers, optionally by category or id list |
//! | [`index_paper`](Store::index_paper) | Mirror a paper into the keyword and vector indexes |
//! | [`keyword_search`](Store::keyword_search) | Field-boosted full-text search |
//! | [`vector_search`](Store::vector_search) | Cosine nearest neighbours over paper embeddings |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Category, NewCategory, NewTag, Paper, PaperFilter, Tag};

/// Keyword-search boost for the title field.
pub const TITLE_BOOST: f64 = 3.0;
/// Keyword-search boost for the abstract field.
pub const ABSTRACT_BOOST: f64 = 2.0;
/// Keyword-search boost for content and keywords.
pub const CONTENT_BOOST: f64 = 1.0;

/// Offset added to cosine similarity so vector scores are non-negative.
pub const VECTOR_SCORE_OFFSET: f64 = 1.0;

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_category(&self, category: &NewCategory) -> Result<Category>;
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn get_category(&self, id: i64) -> Result<Option<Category>>;
    /// Returns `false` when no such category exists.
    async fn delete_category(&self, id: i64) -> Result<bool>;

    /// `tag.slug` must already be resolved.
    async fn create_tag(&self, tag: &NewTag) -> Result<Tag>;
    async fn list_tags(&self) -> Result<Vec<Tag>>;
    async fn get_tag(&self, id: i64) -> Result<Option<Tag>>;
    async fn delete_tag(&self, id: i64) -> Result<bool>;

    /// Stores `paper`, ignoring its `id`, and returns the assigned id.
    async fn insert_paper(&self, paper: &Paper) -> Result<i64>;
    /// Overwrites the paper with `paper.id`. Returns `false` when missing.
    async fn update_paper(&self, paper: &Paper) -> Result<bool>;
    async fn get_paper(&self, id: i64) -> Result<Option<Paper>>;
    /// Newest first, unless `filter.ids` fixes the order.
    async fn list_papers(&self, filter: &PaperFilter) -> Result<Vec<Paper>>;
    async fn delete_paper(&self, id: i64) -> Result<bool>;

    /// Replaces the index entries for `paper`.
    async fn index_paper(&self, paper: &Paper, model: &str) -> Result<()>;
    async fn remove_from_index(&self, id: i64) -> Result<()>;
    /// `(paper id, score)` pairs, best first.
    async fn keyword_search(&self, query: &str, limit: i64) -> Result<Vec<(i64, f64)>>;
    /// `(paper id, cosine + 1.0)` pairs, best first.
    async fn vector_search(&self, query_vec: &[f32], limit: i64) -> Result<Vec<(i64, f64)>>;
}

/// Lowercased alphanumeric query terms.
pub(crate) fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_terms_drop_operators() {
        assert_eq!(query_terms("graph AND \"neural\" -x*"), vec!["graph", "and", "neural", "x"]);
        assert!(query_terms("  ** ").is_empty());
    }
}
