//! SQLite-backed [`Store`].
//!
//! JSON-shaped paper fields (keywords, authors, analysis, topics) are kept
//! in TEXT columns; timestamps are Unix seconds. Keyword search runs over
//! the `papers_fts` FTS5 table with per-column BM25 weights; vector search
//! loads every row of `paper_vectors` and ranks by cosine similarity.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use super::{query_terms, Store, ABSTRACT_BOOST, CONTENT_BOOST, TITLE_BOOST, VECTOR_SCORE_OFFSET};
use crate::config::Config;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Category, NewCategory, NewTag, Paper, PaperFilter, PaperStatus, Tag};
use crate::{db, migrate};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects and applies migrations.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    async fn link_ids(&self, table: &str, column: &str, paper_id: i64) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT {column} FROM {table} WHERE paper_id = ? ORDER BY {column}",
            column = column,
            table = table
        );
        let ids: Vec<i64> = sqlx::query_scalar(&sql)
            .bind(paper_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<Paper> {
        let id: i64 = row.get("id");
        let status: String = row.get("status");
        let keywords: String = row.get("keywords_json");
        let authors: String = row.get("authors_json");
        let analysis: Option<String> = row.get("analysis_json");
        let topics: String = row.get("topics_json");
        let embedding: Option<Vec<u8>> = row.get("embedding");

        Ok(Paper {
            id,
            title: row.get("title"),
            abstract_text: row.get("abstract"),
            content: row.get("content"),
            status: PaperStatus::parse(&status).unwrap_or_default(),
            keywords: serde_json::from_str(&keywords).context("corrupt keywords_json")?,
            authors: serde_json::from_str(&authors).context("corrupt authors_json")?,
            doi: row.get("doi"),
            citations: row.get("citations"),
            impact_factor: row.get("impact_factor"),
            h_index: row.get("h_index"),
            publication_date: from_ts(row.get("publication_date")),
            category_ids: self.link_ids("paper_categories", "category_id", id).await?,
            tag_ids: self.link_ids("paper_tags", "tag_id", id).await?,
            analysis: analysis
                .map(|a| serde_json::from_str(&a))
                .transpose()
                .context("corrupt analysis_json")?,
            topics: serde_json::from_str(&topics).context("corrupt topics_json")?,
            embedding: embedding.map(|b| blob_to_vec(&b)).unwrap_or_default(),
            pdf_url: row.get("pdf_url"),
            created_at: from_ts(row.get("created_at")),
            updated_at: from_ts(row.get("updated_at")),
        })
    }

    async fn write_links(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        paper: &Paper,
        paper_id: i64,
    ) -> Result<()> {
        sqlx::query("DELETE FROM paper_categories WHERE paper_id = ?")
            .bind(paper_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM paper_tags WHERE paper_id = ?")
            .bind(paper_id)
            .execute(&mut **tx)
            .await?;

        for category_id in &paper.category_ids {
            sqlx::query("INSERT OR IGNORE INTO paper_categories (paper_id, category_id) VALUES (?, ?)")
                .bind(paper_id)
                .bind(category_id)
                .execute(&mut **tx)
                .await?;
        }
        for tag_id in &paper.tag_ids {
            sqlx::query("INSERT OR IGNORE INTO paper_tags (paper_id, tag_id) VALUES (?, ?)")
                .bind(paper_id)
                .bind(tag_id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

const TAG_SELECT: &str = r#"
    SELECT t.id, t.name, t.slug, t.description, t.color,
           (SELECT COUNT(*) FROM paper_tags pt WHERE pt.tag_id = t.id) AS usage_count
    FROM tags t
"#;

fn tag_from_row(row: &SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        color: row.get("color"),
        usage_count: row.get("usage_count"),
    }
}

fn category_from_row(row: &SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_category(&self, category: &NewCategory) -> Result<Category> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO categories (name, description) VALUES (?, ?) RETURNING id",
        )
        .bind(&category.name)
        .bind(&category.description)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to create category '{}'", category.name))?;

        Ok(Category {
            id,
            name: category.name.clone(),
            description: category.description.clone(),
        })
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name, description FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(category_from_row).collect())
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let row = sqlx::query("SELECT id, name, description FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(category_from_row))
    }

    async fn delete_category(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_tag(&self, tag: &NewTag) -> Result<Tag> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO tags (name, slug, description, color) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&tag.name)
        .bind(tag.slug.as_deref().unwrap_or_default())
        .bind(&tag.description)
        .bind(&tag.color)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to create tag '{}'", tag.name))?;

        self.get_tag(id)
            .await?
            .with_context(|| format!("tag {} missing after insert", id))
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query(&format!("{} ORDER BY t.name", TAG_SELECT))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn get_tag(&self, id: i64) -> Result<Option<Tag>> {
        let row = sqlx::query(&format!("{} WHERE t.id = ?", TAG_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(tag_from_row))
    }

    async fn delete_tag(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_paper(&self, paper: &Paper) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO papers (title, abstract, content, status, keywords_json, authors_json,
                                doi, citations, impact_factor, h_index, publication_date,
                                analysis_json, topics_json, embedding, pdf_url,
                                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&paper.title)
        .bind(&paper.abstract_text)
        .bind(&paper.content)
        .bind(paper.status.as_str())
        .bind(serde_json::to_string(&paper.keywords)?)
        .bind(serde_json::to_string(&paper.authors)?)
        .bind(&paper.doi)
        .bind(paper.citations)
        .bind(paper.impact_factor)
        .bind(paper.h_index)
        .bind(paper.publication_date.timestamp())
        .bind(paper.analysis.as_ref().map(serde_json::to_string).transpose()?)
        .bind(serde_json::to_string(&paper.topics)?)
        .bind(vec_to_blob(&paper.embedding))
        .bind(&paper.pdf_url)
        .bind(paper.created_at.timestamp())
        .bind(paper.updated_at.timestamp())
        .fetch_one(&mut *tx)
        .await?;

        Self::write_links(&mut tx, paper, id).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn update_paper(&self, paper: &Paper) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE papers SET
                title = ?, abstract = ?, content = ?, status = ?, keywords_json = ?,
                authors_json = ?, doi = ?, citations = ?, impact_factor = ?, h_index = ?,
                publication_date = ?, analysis_json = ?, topics_json = ?, embedding = ?,
                pdf_url = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&paper.title)
        .bind(&paper.abstract_text)
        .bind(&paper.content)
        .bind(paper.status.as_str())
        .bind(serde_json::to_string(&paper.keywords)?)
        .bind(serde_json::to_string(&paper.authors)?)
        .bind(&paper.doi)
        .bind(paper.citations)
        .bind(paper.impact_factor)
        .bind(paper.h_index)
        .bind(paper.publication_date.timestamp())
        .bind(paper.analysis.as_ref().map(serde_json::to_string).transpose()?)
        .bind(serde_json::to_string(&paper.topics)?)
        .bind(vec_to_blob(&paper.embedding))
        .bind(&paper.pdf_url)
        .bind(paper.updated_at.timestamp())
        .bind(paper.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        Self::write_links(&mut tx, paper, paper.id).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn get_paper(&self, id: i64) -> Result<Option<Paper>> {
        let row = sqlx::query("SELECT * FROM papers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list_papers(&self, filter: &PaperFilter) -> Result<Vec<Paper>> {
        if let Some(ids) = &filter.ids {
            // Keep the caller's ranking; filtering and paging happen after.
            let mut papers = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(paper) = self.get_paper(*id).await? {
                    papers.push(paper);
                }
            }
            if let Some(name) = &filter.category {
                let wanted: Option<i64> =
                    sqlx::query_scalar("SELECT id FROM categories WHERE name = ?")
                        .bind(name)
                        .fetch_optional(&self.pool)
                        .await?;
                papers.retain(|p| wanted.map_or(false, |c| p.category_ids.contains(&c)));
            }
            return Ok(papers
                .into_iter()
                .skip(filter.skip.max(0) as usize)
                .take(filter.limit.max(0) as usize)
                .collect());
        }

        let rows = match &filter.category {
            Some(name) => {
                sqlx::query(
                    r#"
                    SELECT p.* FROM papers p
                    JOIN paper_categories pc ON pc.paper_id = p.id
                    JOIN categories c ON c.id = pc.category_id
                    WHERE c.name = ?
                    ORDER BY p.created_at DESC, p.id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(name)
                .bind(filter.limit)
                .bind(filter.skip)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM papers ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?")
                    .bind(filter.limit)
                    .bind(filter.skip)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut papers = Vec::with_capacity(rows.len());
        for row in &rows {
            papers.push(self.hydrate(row).await?);
        }
        Ok(papers)
    }

    async fn delete_paper(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM papers_fts WHERE paper_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM papers WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn index_paper(&self, paper: &Paper, model: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM papers_fts WHERE paper_id = ?")
            .bind(paper.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO papers_fts (paper_id, title, abstract, content, keywords) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(paper.id)
        .bind(&paper.title)
        .bind(&paper.abstract_text)
        .bind(&paper.content)
        .bind(paper.keywords.join(" "))
        .execute(&mut *tx)
        .await?;

        if paper.embedding.is_empty() {
            sqlx::query("DELETE FROM paper_vectors WHERE paper_id = ?")
                .bind(paper.id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO paper_vectors (paper_id, model, dims, embedding)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(paper_id) DO UPDATE SET
                    model = excluded.model,
                    dims = excluded.dims,
                    embedding = excluded.embedding
                "#,
            )
            .bind(paper.id)
            .bind(model)
            .bind(paper.embedding.len() as i64)
            .bind(vec_to_blob(&paper.embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove_from_index(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM papers_fts WHERE paper_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM paper_vectors WHERE paper_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn keyword_search(&self, query: &str, limit: i64) -> Result<Vec<(i64, f64)>> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        // Quote each term so user input never reaches FTS5 query syntax.
        let fts_query = terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR ");

        let sql = format!(
            r#"
            SELECT paper_id, bm25(papers_fts, 0.0, {}, {}, {}, {}) AS score
            FROM papers_fts
            WHERE papers_fts MATCH ?
            ORDER BY score
            LIMIT ?
            "#,
            TITLE_BOOST, ABSTRACT_BOOST, CONTENT_BOOST, CONTENT_BOOST
        );
        let rows = sqlx::query(&sql)
            .bind(fts_query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let score: f64 = row.get("score");
                (row.get::<i64, _>("paper_id"), -score)
            })
            .collect())
    }

    async fn vector_search(&self, query_vec: &[f32], limit: i64) -> Result<Vec<(i64, f64)>> {
        let rows = sqlx::query("SELECT paper_id, embedding FROM paper_vectors WHERE dims = ?")
            .bind(query_vec.len() as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut hits: Vec<(i64, f64)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64;
                (row.get::<i64, _>("paper_id"), similarity + VECTOR_SCORE_OFFSET)
            })
            .collect();

        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }
}
