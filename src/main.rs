//! # Recall CLI (`recall`)
//!
//! Local operation of the hybrid search engine: initialize the index
//! tables, mirror record mutations into the indexes, search, backfill,
//! and inspect index health.
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the SQLite database and index tables |
//! | `recall index <type> <id> <project> "<text>"` | Index (or re-index) one record |
//! | `recall remove <type> <id>` | Remove one record from both indexes |
//! | `recall search "<query>"` | Hybrid search with ranked results |
//! | `recall reindex` | Backfill both indexes from the record tables |
//! | `recall status` | Index row counts and vector availability |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use recall::config::{self, Config};
use recall::{db, migrate, ContentType, SearchOptions, SearchService};

/// Recall — hybrid lexical + semantic search for a project-knowledge
/// store.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file with `[db]`, `[retrieval]`, and `[embedding]`
/// sections.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Hybrid lexical + semantic search for a project-knowledge store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and index tables.
    ///
    /// Creates `memory_fts`, `memory_vectors`, and `memory_vector_meta`.
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Index (or re-index) one record's searchable text.
    Index {
        /// Content type: problem, solution, learning, or change.
        content_type: String,
        /// Record id within its type.
        content_id: i64,
        /// Owning project id.
        project_id: i64,
        /// The text to index (title, description, etc. concatenated).
        text: String,
    },

    /// Remove one record from both indexes. Removing an absent record
    /// succeeds.
    Remove {
        /// Content type: problem, solution, learning, or change.
        content_type: String,
        /// Record id within its type.
        content_id: i64,
    },

    /// Search the indexes and print ranked, enriched results.
    Search {
        /// The search query string.
        query: String,

        /// Restrict results to one project.
        #[arg(long)]
        project: Option<i64>,

        /// Comma-separated content types (e.g. `problem,solution`).
        #[arg(long)]
        types: Option<String>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,

        /// Override the configured lexical weight.
        #[arg(long)]
        lexical_weight: Option<f64>,

        /// Override the configured vector weight.
        #[arg(long)]
        vector_weight: Option<f64>,
    },

    /// Re-submit every record from the record tables through the
    /// indexer. Used to backfill after enabling vector search; safe to
    /// re-run after a partial failure.
    Reindex,

    /// Print index row counts and whether vector search is available.
    Status,
}

fn parse_types(types: &str) -> Result<Vec<ContentType>> {
    types
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| ContentType::from_str(t).map_err(Into::into))
        .collect()
}

async fn run_search(
    service: &SearchService,
    query: &str,
    opts: &SearchOptions,
) -> Result<()> {
    let hits = service.search(query, opts).await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let r = &hit.result;
        println!(
            "{}. [{:.3}] {} / {}",
            i + 1,
            r.combined_score,
            r.breakdown.source(),
            hit.title
        );
        println!("    project: {}", r.project_id);
        println!("    id: {}", r.key);
        if !hit.snippet.is_empty() {
            println!("    snippet: \"{}\"", hit.snippet.replace('\n', " "));
        }
        println!();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recall=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg: Config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Index {
            content_type,
            content_id,
            project_id,
            text,
        } => {
            let content_type = ContentType::from_str(&content_type)?;
            let service = SearchService::open(&cfg).await?;
            service
                .index_content(content_type, content_id, project_id, &text)
                .await?;
            println!("Indexed {}:{}.", content_type, content_id);
        }
        Commands::Remove {
            content_type,
            content_id,
        } => {
            let content_type = ContentType::from_str(&content_type)?;
            let service = SearchService::open(&cfg).await?;
            service.remove_from_index(content_type, content_id).await?;
            println!("Removed {}:{}.", content_type, content_id);
        }
        Commands::Search {
            query,
            project,
            types,
            limit,
            lexical_weight,
            vector_weight,
        } => {
            let content_types = types.as_deref().map(parse_types).transpose()?;
            let service = SearchService::open(&cfg).await?;
            let opts = SearchOptions {
                project_id: project,
                content_types,
                limit,
                lexical_weight,
                vector_weight,
            };
            run_search(&service, &query, &opts).await?;
        }
        Commands::Reindex => {
            let service = SearchService::open(&cfg).await?;
            let count = service.reindex_all().await?;
            println!("Reindexed {} records.", count);
        }
        Commands::Status => {
            let service = SearchService::open(&cfg).await?;
            let status = service.status().await?;
            println!("Lexical entries: {}", status.lexical_entries);
            println!("Vector entries:  {}", status.vector_entries);
            println!(
                "Vector search available: {}",
                if status.vector_available { "yes" } else { "no" }
            );
        }
    }

    Ok(())
}
