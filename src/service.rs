//! Research service: validation, analysis orchestration, persistence, and
//! index maintenance for papers, plus category and tag management.
//!
//! Both front-ends (HTTP server and CLI) go through [`ResearchService`].
//! Creating a paper, or updating its title, abstract, or content, runs the
//! analyzer, the sentence encoder, and the topic model concurrently and
//! stores all three artifacts before mirroring the paper into the search
//! index.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

use crate::analysis::{AnalysisInput, AnalysisResult, Analyzer};
use crate::config::Config;
use crate::models::{
    slugify, Author, Category, CitationMetrics, NewCategory, NewPaper, NewTag, Paper, PaperFilter,
    PaperStatus, PaperUpdate, SimilarPaper, Tag,
};
use crate::registry::ModelRegistry;
use crate::store::sqlite::SqliteStore;
use crate::store::Store;
use crate::topics::TopicDistribution;

pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_ABSTRACT_CHARS: usize = 2000;
pub const MAX_KEYWORDS: usize = 10;
pub const DEFAULT_SIMILAR_LIMIT: i64 = 5;
/// Upper bound on keyword hits considered when listing with a search query.
const SEARCH_CANDIDATES: i64 = 1000;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("analysis failed: {0:#}")]
    Analysis(anyhow::Error),
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// The three per-paper artifacts produced together.
struct Artifacts {
    analysis: AnalysisResult,
    embedding: Vec<f32>,
    topics: TopicDistribution,
}

#[derive(Clone)]
pub struct ResearchService {
    store: Arc<dyn Store>,
    analyzer: Analyzer,
}

impl ResearchService {
    pub fn new(store: Arc<dyn Store>, analyzer: Analyzer) -> Self {
        Self { store, analyzer }
    }

    /// Opens the SQLite store (running migrations) and loads the models.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let store = SqliteStore::open(config).await?;
        let models = ModelRegistry::load(&config.models, &config.topics).await?;
        Ok(Self::new(Arc::new(store), Analyzer::new(Arc::new(models))))
    }

    // ---- papers ----

    pub async fn get(&self, id: i64) -> ServiceResult<Paper> {
        self.store
            .get_paper(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("research {}", id)))
    }

    /// Lists papers newest first. With `search`, only keyword hits are
    /// returned, in relevance order.
    pub async fn list(
        &self,
        skip: i64,
        limit: i64,
        category: Option<String>,
        search: Option<String>,
    ) -> ServiceResult<Vec<Paper>> {
        if skip < 0 || limit < 0 {
            return Err(ServiceError::Validation(
                "skip and limit must be non-negative".to_string(),
            ));
        }

        let ids = match search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => {
                let hits = self.store.keyword_search(query, SEARCH_CANDIDATES).await?;
                Some(hits.into_iter().map(|(id, _)| id).collect())
            }
            None => None,
        };

        let filter = PaperFilter {
            skip,
            limit,
            category,
            ids,
        };
        Ok(self.store.list_papers(&filter).await?)
    }

    pub async fn create(&self, new: NewPaper) -> ServiceResult<Paper> {
        validate_title(&new.title)?;
        let abstract_text = new.abstract_text.unwrap_or_default();
        validate_abstract(&abstract_text)?;
        let status = parse_status(new.status.as_deref())?.unwrap_or_default();
        validate_keywords(&new.keywords)?;
        validate_authors(&new.authors)?;
        self.validate_links(&new.category_ids, &new.tag_ids).await?;

        let now = Utc::now();
        let mut paper = Paper {
            id: 0,
            title: new.title,
            abstract_text,
            content: new.content.unwrap_or_default(),
            status,
            keywords: new.keywords,
            authors: new.authors,
            doi: new.doi,
            citations: 0,
            impact_factor: None,
            h_index: None,
            publication_date: now,
            category_ids: dedup(new.category_ids),
            tag_ids: dedup(new.tag_ids),
            analysis: None,
            topics: TopicDistribution::new(),
            embedding: Vec::new(),
            pdf_url: None,
            created_at: now,
            updated_at: now,
        };

        self.apply_artifacts(&mut paper).await?;
        paper.id = self.store.insert_paper(&paper).await?;
        self.index(&paper).await?;

        tracing::info!(
            id = paper.id,
            title = %paper.title,
            overall = ?paper.analysis.as_ref().map(|a| a.overall_score),
            "research created"
        );
        Ok(paper)
    }

    /// Applies a partial update. Analysis artifacts are recomputed only when
    /// the title, abstract, or content is part of the update.
    pub async fn update(&self, id: i64, update: PaperUpdate) -> ServiceResult<Paper> {
        let mut paper = self.get(id).await?;
        let reanalyze = update.touches_analyzed_text();

        if let Some(title) = update.title {
            validate_title(&title)?;
            paper.title = title;
        }
        if let Some(abstract_text) = update.abstract_text {
            validate_abstract(&abstract_text)?;
            paper.abstract_text = abstract_text;
        }
        if let Some(content) = update.content {
            paper.content = content;
        }
        if let Some(status) = parse_status(update.status.as_deref())? {
            paper.status = status;
        }
        if let Some(keywords) = update.keywords {
            validate_keywords(&keywords)?;
            paper.keywords = keywords;
        }
        if let Some(authors) = update.authors {
            validate_authors(&authors)?;
            paper.authors = authors;
        }
        if let Some(doi) = update.doi {
            paper.doi = Some(doi);
        }
        let category_ids = update.category_ids.unwrap_or_else(|| paper.category_ids.clone());
        let tag_ids = update.tag_ids.unwrap_or_else(|| paper.tag_ids.clone());
        self.validate_links(&category_ids, &tag_ids).await?;
        paper.category_ids = dedup(category_ids);
        paper.tag_ids = dedup(tag_ids);

        if reanalyze {
            self.apply_artifacts(&mut paper).await?;
        }
        paper.updated_at = Utc::now();

        if !self.store.update_paper(&paper).await? {
            return Err(ServiceError::NotFound(format!("research {}", id)));
        }
        self.index(&paper).await?;

        tracing::info!(id, reanalyzed = reanalyze, "research updated");
        Ok(paper)
    }

    /// Recomputes every analysis artifact regardless of what changed.
    pub async fn reanalyze(&self, id: i64) -> ServiceResult<Paper> {
        let mut paper = self.get(id).await?;
        self.apply_artifacts(&mut paper).await?;
        paper.updated_at = Utc::now();
        self.store.update_paper(&paper).await?;
        self.index(&paper).await?;
        tracing::info!(id, "research re-analyzed");
        Ok(paper)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.get(id).await?;
        self.store.remove_from_index(id).await?;
        self.store.delete_paper(id).await?;
        tracing::info!(id, "research deleted");
        Ok(())
    }

    /// Nearest neighbours by embedding, excluding the paper itself.
    ///
    /// A paper without an embedding has no neighbours.
    pub async fn similar(&self, id: i64, limit: i64) -> ServiceResult<Vec<SimilarPaper>> {
        let paper = self.get(id).await?;
        if paper.embedding.is_empty() || limit <= 0 {
            return Ok(Vec::new());
        }

        let hits = self.store.vector_search(&paper.embedding, limit.saturating_add(1)).await?;
        let mut similar = Vec::new();
        for (hit_id, score) in hits.into_iter().filter(|(hit, _)| *hit != id) {
            if similar.len() as i64 >= limit {
                break;
            }
            if let Some(p) = self.store.get_paper(hit_id).await? {
                similar.push(SimilarPaper {
                    id: p.id,
                    title: p.title,
                    abstract_text: p.abstract_text,
                    keywords: p.keywords,
                    similarity_score: score,
                });
            }
        }
        Ok(similar)
    }

    pub async fn citations(&self, id: i64) -> ServiceResult<CitationMetrics> {
        let paper = self.get(id).await?;
        Ok(CitationMetrics::from(&paper))
    }

    /// Scores ad-hoc text without storing anything.
    pub async fn analyze(&self, input: &AnalysisInput) -> ServiceResult<AnalysisResult> {
        self.analyzer
            .analyze(input)
            .await
            .map_err(ServiceError::Analysis)
    }

    pub async fn topics(&self, text: &str) -> ServiceResult<TopicDistribution> {
        self.analyzer
            .extract_topics(text)
            .await
            .map_err(ServiceError::Analysis)
    }

    async fn apply_artifacts(&self, paper: &mut Paper) -> ServiceResult<()> {
        let artifacts = self.compute_artifacts(paper).await?;
        paper.analysis = Some(artifacts.analysis);
        paper.embedding = artifacts.embedding;
        paper.topics = artifacts.topics;
        Ok(())
    }

    async fn compute_artifacts(&self, paper: &Paper) -> ServiceResult<Artifacts> {
        let input = paper.analysis_input();
        let embed_text = input.global_text();
        let (analysis, embedding, topics) = tokio::try_join!(
            self.analyzer.analyze(&input),
            self.analyzer.generate_embedding(&embed_text),
            self.analyzer.extract_topics(&paper.content),
        )
        .map_err(|e| {
            tracing::warn!(title = %paper.title, error = %e, "analysis failed");
            ServiceError::Analysis(e)
        })?;

        Ok(Artifacts {
            analysis,
            embedding,
            topics,
        })
    }

    async fn index(&self, paper: &Paper) -> ServiceResult<()> {
        let model = self.analyzer.models().sentence.model_name().to_string();
        self.store.index_paper(paper, &model).await?;
        Ok(())
    }

    async fn validate_links(&self, category_ids: &[i64], tag_ids: &[i64]) -> ServiceResult<()> {
        for id in category_ids {
            if self.store.get_category(*id).await?.is_none() {
                return Err(ServiceError::Validation(format!("unknown category id {}", id)));
            }
        }
        for id in tag_ids {
            if self.store.get_tag(*id).await?.is_none() {
                return Err(ServiceError::Validation(format!("unknown tag id {}", id)));
            }
        }
        Ok(())
    }

    // ---- categories ----

    pub async fn create_category(&self, new: NewCategory) -> ServiceResult<Category> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::Validation("category name must not be empty".into()));
        }
        if self
            .store
            .list_categories()
            .await?
            .iter()
            .any(|c| c.name == name)
        {
            return Err(ServiceError::Validation(format!("category '{}' already exists", name)));
        }
        let created = self
            .store
            .create_category(&NewCategory {
                name,
                description: new.description,
            })
            .await?;
        tracing::info!(id = created.id, name = %created.name, "category created");
        Ok(created)
    }

    pub async fn list_categories(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.store.list_categories().await?)
    }

    pub async fn delete_category(&self, id: i64) -> ServiceResult<()> {
        if !self.store.delete_category(id).await? {
            return Err(ServiceError::NotFound(format!("category {}", id)));
        }
        Ok(())
    }

    // ---- tags ----

    pub async fn create_tag(&self, new: NewTag) -> ServiceResult<Tag> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::Validation("tag name must not be empty".into()));
        }
        let slug = slugify(new.slug.as_deref().unwrap_or(&name));
        if slug.is_empty() {
            return Err(ServiceError::Validation(format!(
                "tag name '{}' has no characters usable in a slug",
                name
            )));
        }
        if self
            .store
            .list_tags()
            .await?
            .iter()
            .any(|t| t.name == name || t.slug == slug)
        {
            return Err(ServiceError::Validation(format!("tag '{}' already exists", name)));
        }

        let created = self
            .store
            .create_tag(&NewTag {
                name,
                slug: Some(slug),
                description: new.description,
                color: new.color,
            })
            .await?;
        tracing::info!(id = created.id, slug = %created.slug, "tag created");
        Ok(created)
    }

    pub async fn list_tags(&self) -> ServiceResult<Vec<Tag>> {
        Ok(self.store.list_tags().await?)
    }

    pub async fn delete_tag(&self, id: i64) -> ServiceResult<()> {
        if !self.store.delete_tag(id).await? {
            return Err(ServiceError::NotFound(format!("tag {}", id)));
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> ServiceResult<()> {
    let len = title.chars().count();
    if len == 0 || len > MAX_TITLE_CHARS {
        return Err(ServiceError::Validation(format!(
            "title must be 1-{} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(())
}

fn validate_abstract(abstract_text: &str) -> ServiceResult<()> {
    if abstract_text.chars().count() > MAX_ABSTRACT_CHARS {
        return Err(ServiceError::Validation(format!(
            "abstract must be at most {} characters",
            MAX_ABSTRACT_CHARS
        )));
    }
    Ok(())
}

fn validate_keywords(keywords: &[String]) -> ServiceResult<()> {
    if keywords.len() > MAX_KEYWORDS {
        return Err(ServiceError::Validation(format!(
            "Maximum {} keywords allowed",
            MAX_KEYWORDS
        )));
    }
    Ok(())
}

fn validate_authors(authors: &[Author]) -> ServiceResult<()> {
    if authors
        .iter()
        .any(|a| a.name.trim().is_empty() || a.affiliation.trim().is_empty())
    {
        return Err(ServiceError::Validation(
            "each author must have a name and an affiliation".to_string(),
        ));
    }
    Ok(())
}

fn parse_status(status: Option<&str>) -> ServiceResult<Option<PaperStatus>> {
    match status {
        None => Ok(None),
        Some(s) => PaperStatus::parse(s).map(Some).ok_or_else(|| {
            ServiceError::Validation(format!(
                "status must be draft, published, or under_review (got '{}')",
                s
            ))
        }),
    }
}

fn dedup(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids.dedup();
    ids
}
