//! In-memory [`Store`] implementation for tests.
//!
//! Uses `BTreeMap`s behind `std::sync::RwLock`. Keyword search counts
//! query-term occurrences per field and applies the field boosts; vector
//! search is brute-force cosine similarity.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use super::{query_terms, Store, ABSTRACT_BOOST, CONTENT_BOOST, TITLE_BOOST, VECTOR_SCORE_OFFSET};
use crate::embedding::cosine_similarity;
use crate::models::{Category, NewCategory, NewTag, Paper, PaperFilter, Tag};

struct IndexEntry {
    title: String,
    abstract_text: String,
    content: String,
    keywords: String,
    vector: Vec<f32>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    papers: BTreeMap<i64, Paper>,
    categories: BTreeMap<i64, Category>,
    tags: BTreeMap<i64, NewTag>,
    index: BTreeMap<i64, IndexEntry>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn tag(&self, id: i64) -> Option<Tag> {
        self.tags.get(&id).map(|t| Tag {
            id,
            name: t.name.clone(),
            slug: t.slug.clone().unwrap_or_default(),
            description: t.description.clone(),
            color: t.color.clone(),
            usage_count: self.papers.values().filter(|p| p.tag_ids.contains(&id)).count() as i64,
        })
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

fn occurrences(haystack: &str, terms: &[String]) -> f64 {
    let lower = haystack.to_lowercase();
    let tokens = query_terms(&lower);
    terms
        .iter()
        .map(|t| tokens.iter().filter(|w| *w == t).count())
        .sum::<usize>() as f64
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_category(&self, category: &NewCategory) -> Result<Category> {
        let mut tables = self.write()?;
        if tables.categories.values().any(|c| c.name == category.name) {
            bail!("category '{}' already exists", category.name);
        }
        let id = tables.next_id();
        let created = Category {
            id,
            name: category.name.clone(),
            description: category.description.clone(),
        };
        tables.categories.insert(id, created.clone());
        Ok(created)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut all: Vec<Category> = self.read()?.categories.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>> {
        Ok(self.read()?.categories.get(&id).cloned())
    }

    async fn delete_category(&self, id: i64) -> Result<bool> {
        let mut tables = self.write()?;
        if tables.categories.remove(&id).is_none() {
            return Ok(false);
        }
        for paper in tables.papers.values_mut() {
            paper.category_ids.retain(|c| *c != id);
        }
        Ok(true)
    }

    async fn create_tag(&self, tag: &NewTag) -> Result<Tag> {
        let mut tables = self.write()?;
        if tables
            .tags
            .values()
            .any(|t| t.name == tag.name || t.slug == tag.slug)
        {
            bail!("tag '{}' already exists", tag.name);
        }
        let id = tables.next_id();
        tables.tags.insert(id, tag.clone());
        tables
            .tag(id)
            .ok_or_else(|| anyhow!("tag {} vanished after insert", id))
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let tables = self.read()?;
        let mut all: Vec<Tag> = tables.tags.keys().filter_map(|id| tables.tag(*id)).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn get_tag(&self, id: i64) -> Result<Option<Tag>> {
        Ok(self.read()?.tag(id))
    }

    async fn delete_tag(&self, id: i64) -> Result<bool> {
        let mut tables = self.write()?;
        if tables.tags.remove(&id).is_none() {
            return Ok(false);
        }
        for paper in tables.papers.values_mut() {
            paper.tag_ids.retain(|t| *t != id);
        }
        Ok(true)
    }

    async fn insert_paper(&self, paper: &Paper) -> Result<i64> {
        let mut tables = self.write()?;
        let id = tables.next_id();
        let mut stored = paper.clone();
        stored.id = id;
        tables.papers.insert(id, stored);
        Ok(id)
    }

    async fn update_paper(&self, paper: &Paper) -> Result<bool> {
        let mut tables = self.write()?;
        match tables.papers.get_mut(&paper.id) {
            Some(slot) => {
                *slot = paper.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_paper(&self, id: i64) -> Result<Option<Paper>> {
        Ok(self.read()?.papers.get(&id).cloned())
    }

    async fn list_papers(&self, filter: &PaperFilter) -> Result<Vec<Paper>> {
        let tables = self.read()?;

        let category_id = match &filter.category {
            Some(name) => match tables.categories.values().find(|c| &c.name == name) {
                Some(c) => Some(c.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let candidates: Vec<&Paper> = match &filter.ids {
            Some(ids) => ids.iter().filter_map(|id| tables.papers.get(id)).collect(),
            None => {
                let mut all: Vec<&Paper> = tables.papers.values().collect();
                all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
                all
            }
        };

        Ok(candidates
            .into_iter()
            .filter(|p| category_id.map_or(true, |c| p.category_ids.contains(&c)))
            .skip(filter.skip.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn delete_paper(&self, id: i64) -> Result<bool> {
        let mut tables = self.write()?;
        tables.index.remove(&id);
        Ok(tables.papers.remove(&id).is_some())
    }

    async fn index_paper(&self, paper: &Paper, _model: &str) -> Result<()> {
        let mut tables = self.write()?;
        tables.index.insert(
            paper.id,
            IndexEntry {
                title: paper.title.clone(),
                abstract_text: paper.abstract_text.clone(),
                content: paper.content.clone(),
                keywords: paper.keywords.join(" "),
                vector: paper.embedding.clone(),
            },
        );
        Ok(())
    }

    async fn remove_from_index(&self, id: i64) -> Result<()> {
        self.write()?.index.remove(&id);
        Ok(())
    }

    async fn keyword_search(&self, query: &str, limit: i64) -> Result<Vec<(i64, f64)>> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let tables = self.read()?;
        let mut hits: Vec<(i64, f64)> = tables
            .index
            .iter()
            .map(|(id, e)| {
                let score = TITLE_BOOST * occurrences(&e.title, &terms)
                    + ABSTRACT_BOOST * occurrences(&e.abstract_text, &terms)
                    + CONTENT_BOOST * occurrences(&e.content, &terms)
                    + CONTENT_BOOST * occurrences(&e.keywords, &terms);
                (*id, score)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();

        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }

    async fn vector_search(&self, query_vec: &[f32], limit: i64) -> Result<Vec<(i64, f64)>> {
        let tables = self.read()?;
        let mut hits: Vec<(i64, f64)> = tables
            .index
            .iter()
            .filter(|(_, e)| e.vector.len() == query_vec.len() && !e.vector.is_empty())
            .map(|(id, e)| {
                (*id, cosine_similarity(query_vec, &e.vector) as f64 + VECTOR_SCORE_OFFSET)
            })
            .collect();

        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }
}
