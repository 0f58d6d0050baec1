//! # Research Folio CLI (`folio`)
//!
//! ## Usage
//!
//! ```bash
//! folio --config ./config/folio.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `folio init` | Create the SQLite database and run schema migrations |
//! | `folio serve` | Start the HTTP API |
//! | `folio analyze` | Score a paper given on the command line (nothing is stored) |
//! | `folio topics <file>` | Extract topics from a text file |
//! | `folio paper add` | Create, analyze, and index a paper |
//! | `folio paper get <id>` | Print a stored paper as JSON |
//! | `folio paper list` | List papers, optionally filtered or searched |
//! | `folio paper update <id>` | Partially update a paper |
//! | `folio paper delete <id>` | Delete a paper |
//! | `folio paper similar <id>` | Nearest neighbours by embedding |
//! | `folio paper reanalyze <id>` | Recompute a paper's analysis artifacts |
//!
//! ## Examples
//!
//! ```bash
//! folio init
//! folio paper add --title "Sparse attention" --abstract "We propose..." \
//!     --content-file paper.txt --keyword nlp --author "Ada@Analytical Engines"
//! folio paper list --search attention
//! folio serve
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use research_folio::paper_cmd::PaperFields;
use research_folio::{analyze_cmd, config, paper_cmd, server, store};

/// Research Folio: research-paper storage with content scoring, topic
/// extraction, and similarity search.
#[derive(Parser)]
#[command(name = "folio", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/folio.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace). `FOLIO_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it again is safe.
    Init,
    /// Start the HTTP API on `[server].bind`.
    Serve,
    /// Score a paper without storing it. Prints the analysis as JSON.
    Analyze {
        #[arg(long)]
        title: String,
        #[arg(long = "abstract")]
        abstract_text: Option<String>,
        /// File holding the paper body.
        #[arg(long)]
        content_file: Option<PathBuf>,
        /// Keyword (repeatable).
        #[arg(long = "keyword")]
        keywords: Vec<String>,
    },
    /// Extract topics from a text file.
    Topics {
        path: PathBuf,
    },
    /// Manage stored papers.
    Paper {
        #[command(subcommand)]
        action: PaperAction,
    },
}

#[derive(Subcommand)]
enum PaperAction {
    /// Create a paper, analyze it, and index it.
    Add(PaperArgs),
    /// Print one paper as JSON.
    Get { id: i64 },
    /// List papers, newest first.
    List {
        #[arg(long, default_value_t = 0)]
        skip: i64,
        #[arg(long, default_value_t = 10)]
        limit: i64,
        /// Only papers in this category (by name).
        #[arg(long)]
        category: Option<String>,
        /// Keyword search over title, abstract, and content.
        #[arg(long)]
        search: Option<String>,
    },
    /// Update the given fields. Title, abstract, or content changes trigger
    /// re-analysis.
    Update {
        id: i64,
        #[command(flatten)]
        fields: PaperArgs,
    },
    /// Delete a paper and its index entries.
    Delete { id: i64 },
    /// Show the papers most similar to this one.
    Similar {
        id: i64,
        #[arg(long, default_value_t = 5)]
        limit: i64,
    },
    /// Recompute a paper's analysis, embedding, and topics.
    Reanalyze { id: i64 },
}

#[derive(Args)]
struct PaperArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long = "abstract")]
    abstract_text: Option<String>,
    #[arg(long)]
    content_file: Option<PathBuf>,
    /// draft, published, or under_review.
    #[arg(long)]
    status: Option<String>,
    /// Keyword (repeatable).
    #[arg(long = "keyword")]
    keywords: Vec<String>,
    /// Author as `name@affiliation` (repeatable).
    #[arg(long = "author")]
    authors: Vec<String>,
    #[arg(long)]
    doi: Option<String>,
    /// Category id (repeatable).
    #[arg(long = "category")]
    categories: Vec<i64>,
    /// Tag id (repeatable).
    #[arg(long = "tag")]
    tags: Vec<i64>,
}

impl From<PaperArgs> for PaperFields {
    fn from(args: PaperArgs) -> Self {
        fn some<T>(v: Vec<T>) -> Option<Vec<T>> {
            (!v.is_empty()).then_some(v)
        }
        PaperFields {
            title: args.title,
            abstract_text: args.abstract_text,
            content_file: args.content_file,
            status: args.status,
            keywords: some(args.keywords),
            authors: some(args.authors),
            doi: args.doi,
            categories: some(args.categories),
            tags: some(args.tags),
        }
    }
}

fn init_tracing(default_level: &str, verbose: u8) {
    let level = match verbose {
        0 => default_level,
        1 => "debug",
        _ => "trace",
    };
    let filter = std::env::var("FOLIO_LOG").unwrap_or_else(|_| level.to_string());

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    tracing_subscriber::registry().with(stderr_layer).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg.logging.level, cli.verbose);

    match cli.command {
        Commands::Init => {
            store::sqlite::SqliteStore::open(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Analyze {
            title,
            abstract_text,
            content_file,
            keywords,
        } => {
            analyze_cmd::run_analyze(&cfg, title, abstract_text, content_file.as_deref(), keywords)
                .await?;
        }
        Commands::Topics { path } => {
            analyze_cmd::run_topics(&cfg, &path).await?;
        }
        Commands::Paper { action } => match action {
            PaperAction::Add(args) => paper_cmd::run_add(&cfg, args.into()).await?,
            PaperAction::Get { id } => paper_cmd::run_get(&cfg, id).await?,
            PaperAction::List {
                skip,
                limit,
                category,
                search,
            } => paper_cmd::run_list(&cfg, skip, limit, category, search).await?,
            PaperAction::Update { id, fields } => {
                paper_cmd::run_update(&cfg, id, fields.into()).await?
            }
            PaperAction::Delete { id } => paper_cmd::run_delete(&cfg, id).await?,
            PaperAction::Similar { id, limit } => paper_cmd::run_similar(&cfg, id, limit).await?,
            PaperAction::Reanalyze { id } => paper_cmd::run_reanalyze(&cfg, id).await?,
        },
    }

    Ok(())
}
