//! `folio paper ...` commands.
//!
//! Each command opens the service against the configured database, runs one
//! operation, and prints the result. Full records are printed as pretty
//! JSON; listings use one line per paper.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::models::{Author, NewPaper, Paper, PaperUpdate};
use crate::service::ResearchService;

/// Fields shared by `paper add` and `paper update`.
#[derive(Debug, Default)]
pub struct PaperFields {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub content_file: Option<PathBuf>,
    pub status: Option<String>,
    pub keywords: Option<Vec<String>>,
    /// `name@affiliation` entries.
    pub authors: Option<Vec<String>>,
    pub doi: Option<String>,
    pub categories: Option<Vec<i64>>,
    pub tags: Option<Vec<i64>>,
}

/// Parses `name@affiliation`. Everything after the last `@` is the
/// affiliation.
pub fn parse_author(value: &str) -> Result<Author> {
    let (name, affiliation) = value
        .rsplit_once('@')
        .with_context(|| format!("author '{}' must be written as name@affiliation", value))?;
    Ok(Author {
        name: name.trim().to_string(),
        affiliation: affiliation.trim().to_string(),
    })
}

fn read_content(path: Option<&Path>) -> Result<Option<String>> {
    path.map(|p| {
        std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read content file: {}", p.display()))
    })
    .transpose()
}

fn parse_authors(specs: Option<Vec<String>>) -> Result<Option<Vec<Author>>> {
    specs
        .map(|v| v.iter().map(|s| parse_author(s)).collect::<Result<Vec<_>>>())
        .transpose()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_summary(paper: &Paper) {
    let score = paper
        .analysis
        .as_ref()
        .map(|a| format!("{:.3}", a.overall_score))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:>5}  {:<12}  score={}  {}",
        paper.id,
        paper.status.as_str(),
        score,
        paper.title
    );
}

pub async fn run_add(config: &Config, fields: PaperFields) -> Result<()> {
    let service = ResearchService::open(config).await?;
    let new = NewPaper {
        title: fields.title.unwrap_or_default(),
        abstract_text: fields.abstract_text,
        content: read_content(fields.content_file.as_deref())?,
        status: fields.status,
        keywords: fields.keywords.unwrap_or_default(),
        authors: parse_authors(fields.authors)?.unwrap_or_default(),
        doi: fields.doi,
        category_ids: fields.categories.unwrap_or_default(),
        tag_ids: fields.tags.unwrap_or_default(),
    };
    let paper = service.create(new).await?;
    println!("Created research {}", paper.id);
    print_json(&paper)
}

pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    let service = ResearchService::open(config).await?;
    let paper = service.get(id).await?;
    print_json(&paper)
}

pub async fn run_list(
    config: &Config,
    skip: i64,
    limit: i64,
    category: Option<String>,
    search: Option<String>,
) -> Result<()> {
    let service = ResearchService::open(config).await?;
    let papers = service.list(skip, limit, category, search).await?;
    if papers.is_empty() {
        println!("No research found.");
        return Ok(());
    }
    for paper in &papers {
        print_summary(paper);
    }
    Ok(())
}

pub async fn run_update(config: &Config, id: i64, fields: PaperFields) -> Result<()> {
    let service = ResearchService::open(config).await?;
    let update = PaperUpdate {
        title: fields.title,
        abstract_text: fields.abstract_text,
        content: read_content(fields.content_file.as_deref())?,
        status: fields.status,
        keywords: fields.keywords,
        authors: parse_authors(fields.authors)?,
        doi: fields.doi,
        category_ids: fields.categories,
        tag_ids: fields.tags,
    };
    let reanalyzed = update.touches_analyzed_text();
    let paper = service.update(id, update).await?;
    println!(
        "Updated research {}{}",
        paper.id,
        if reanalyzed { " (re-analyzed)" } else { "" }
    );
    print_json(&paper)
}

pub async fn run_delete(config: &Config, id: i64) -> Result<()> {
    let service = ResearchService::open(config).await?;
    service.delete(id).await?;
    println!("Deleted research {}", id);
    Ok(())
}

pub async fn run_similar(config: &Config, id: i64, limit: i64) -> Result<()> {
    let service = ResearchService::open(config).await?;
    let similar = service.similar(id, limit).await?;
    if similar.is_empty() {
        println!("No similar research found.");
        return Ok(());
    }
    for hit in &similar {
        println!("{:>5}  {:.4}  {}", hit.id, hit.similarity_score, hit.title);
    }
    Ok(())
}

pub async fn run_reanalyze(config: &Config, id: i64) -> Result<()> {
    let service = ResearchService::open(config).await?;
    let paper = service.reanalyze(id).await?;
    print_json(&paper.analysis)
}
