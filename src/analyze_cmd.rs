//! `folio analyze` and `folio topics`: score or topic-model text without
//! touching the database.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::analysis::{AnalysisInput, Analyzer};
use crate::config::Config;
use crate::registry::ModelRegistry;

async fn load_analyzer(config: &Config) -> Result<Analyzer> {
    let models = ModelRegistry::load(&config.models, &config.topics).await?;
    Ok(Analyzer::new(Arc::new(models)))
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub async fn run_analyze(
    config: &Config,
    title: String,
    abstract_text: Option<String>,
    content_file: Option<&Path>,
    keywords: Vec<String>,
) -> Result<()> {
    let input = AnalysisInput {
        title,
        abstract_text: abstract_text.unwrap_or_default(),
        content: content_file.map(read_file).transpose()?.unwrap_or_default(),
        keywords,
    };

    let analyzer = load_analyzer(config).await?;
    let result = analyzer.analyze(&input).await.context("analysis failed")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub async fn run_topics(config: &Config, path: &Path) -> Result<()> {
    let text = read_file(path)?;
    let analyzer = load_analyzer(config).await?;
    let topics = analyzer.extract_topics(&text).await?;

    if topics.is_empty() {
        println!("No topics: the text has no usable terms.");
        return Ok(());
    }
    for (id, topic) in &topics {
        println!("{:<9} {:.4}  {}", id, topic.weight, topic.words.join(", "));
    }
    Ok(())
}
