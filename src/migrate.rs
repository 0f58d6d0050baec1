//! Idempotent schema creation. Safe to run on every startup.

use anyhow::Result;
use sqlx::SqlitePool;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS papers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        abstract TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'draft',
        keywords_json TEXT NOT NULL DEFAULT '[]',
        authors_json TEXT NOT NULL DEFAULT '[]',
        doi TEXT,
        citations INTEGER NOT NULL DEFAULT 0,
        impact_factor REAL,
        h_index REAL,
        publication_date INTEGER NOT NULL,
        analysis_json TEXT,
        topics_json TEXT NOT NULL DEFAULT '{}',
        embedding BLOB,
        pdf_url TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        slug TEXT NOT NULL UNIQUE,
        description TEXT,
        color TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS paper_categories (
        paper_id INTEGER NOT NULL REFERENCES papers(id) ON DELETE CASCADE,
        category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
        PRIMARY KEY (paper_id, category_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS paper_tags (
        paper_id INTEGER NOT NULL REFERENCES papers(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (paper_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS paper_vectors (
        paper_id INTEGER PRIMARY KEY REFERENCES papers(id) ON DELETE CASCADE,
        model TEXT NOT NULL,
        dims INTEGER NOT NULL,
        embedding BLOB NOT NULL
    )
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_papers_created_at ON papers(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_paper_categories_category ON paper_categories(category_id)",
    "CREATE INDEX IF NOT EXISTS idx_paper_tags_tag ON paper_tags(tag_id)",
];

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for statement in TABLES {
        sqlx::query(statement).execute(pool).await?;
    }

    // FTS5 has no IF NOT EXISTS
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='papers_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE papers_fts USING fts5(
                paper_id UNINDEXED,
                title,
                abstract,
                content,
                keywords
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    for statement in INDEXES {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::debug!("migrations applied");
    Ok(())
}
