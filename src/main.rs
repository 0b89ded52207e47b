//! # Ontology Harness CLI (`onto`)
//!
//! The `onto` binary is the primary interface for Ontology Harness. It
//! provides commands for schema initialization, one-shot ingestion,
//! querying, catalog synchronisation, and starting the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! onto --config ./config/onto.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `onto init` | Ensure the vector store schema exists |
//! | `onto ingest <file>` | Ingest one ontology file synchronously |
//! | `onto query "<text>"` | Answer a question from the indexed ontologies |
//! | `onto sync` | Run one catalog synchronisation cycle |
//! | `onto serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the vector store schema
//! onto init --config ./config/onto.toml
//!
//! # Ingest a Turtle ontology
//! onto ingest ./pizza.ttl --ontology-id PIZZA --version 2.0
//!
//! # Re-ingest a new version, replacing the indexed chunks
//! onto ingest ./pizza.ttl --ontology-id PIZZA --version 2.1 --update
//!
//! # Ask a question
//! onto query "what is a Margherita?" --config ./config/onto.toml
//!
//! # Start the HTTP API
//! onto serve --config ./config/onto.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ontology_harness::catalog::CatalogClient;
use ontology_harness::config::load_config;
use ontology_harness::ingest::{run_ingestion, IngestJob, InlineDispatcher};
use ontology_harness::retrieve::answer_query;
use ontology_harness::server::run_server;
use ontology_harness::store::{HttpVectorStore, VectorStore};
use ontology_harness::sync::run_sync_cycle;

/// Ontology Harness CLI — ontology ingestion and retrieval-augmented
/// question answering.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/onto.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "onto",
    about = "Ontology Harness — ontology ingestion and retrieval-augmented question answering",
    version,
    long_about = "Ontology Harness ingests RDF-family ontology documents through a tolerant \
    sanitation and format-fallback parsing pipeline, indexes them as heading-scoped chunks in a \
    vector store, and answers natural-language questions with hybrid search, reranking, and \
    generation."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/onto.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ensure the vector store schema exists.
    ///
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Ingest one ontology file synchronously.
    ///
    /// Runs the full pipeline: sanitation, format-fallback parsing,
    /// Markdown conversion, chunking, and indexing.
    Ingest {
        /// Path to the ontology file (Turtle, RDF/XML, N-Triples, TriG).
        file: PathBuf,

        /// Ontology identifier the chunks are indexed under.
        #[arg(long)]
        ontology_id: String,

        /// Version label recorded with every chunk.
        #[arg(long)]
        version: String,

        /// Delete previously indexed chunks for this ontology first.
        #[arg(long)]
        update: bool,

        /// Arbitrary metadata attached to every chunk (JSON object).
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Answer a natural-language question from the indexed ontologies.
    Query {
        /// The question text.
        query: String,
    },

    /// Run one catalog synchronisation cycle.
    ///
    /// Compares catalog versions against the index and ingests new or
    /// updated ontologies. Requires `[sync] enabled = true`.
    Sync,

    /// Start the HTTP API server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = HttpVectorStore::new(&config.store)?;
            store.ensure_schema().await?;
            println!("vector store schema initialized");
        }

        Commands::Ingest {
            file,
            ontology_id,
            version,
            update,
            metadata,
        } => {
            let file_bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let metadata = metadata
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("--metadata must be valid JSON")?
                .unwrap_or(serde_json::Value::Null);

            let job = IngestJob {
                file_bytes,
                filename: file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                ontology_id,
                version,
                is_update: update,
                metadata,
            };

            let store = HttpVectorStore::new(&config.store)?;
            let task_id = Uuid::new_v4().to_string();
            let count = run_ingestion(&store, &config.sanitize, &job, &task_id).await?;

            println!("ingest {}", file.display());
            println!("  task: {task_id}");
            println!("  chunks indexed: {count}");
            println!("ok");
        }

        Commands::Query { query } => {
            let store = HttpVectorStore::new(&config.store)?;
            let response = answer_query(&store, &config, &query).await;

            println!("{}", response.answer);
            if !response.sources.is_empty() {
                println!();
                println!("sources:");
                for (i, source) in response.sources.iter().enumerate() {
                    println!(
                        "{}. {} (version {})",
                        i + 1,
                        source.ontology_id,
                        source.version
                    );
                    println!(
                        "    excerpt: \"{}\"",
                        truncate(&source.content.replace('\n', " "), 160)
                    );
                }
            }
        }

        Commands::Sync => {
            let store: Arc<dyn VectorStore> = Arc::new(HttpVectorStore::new(&config.store)?);
            let catalog = CatalogClient::new(&config.catalog)?;
            let dispatcher = InlineDispatcher {
                store: store.clone(),
                sanitize: config.sanitize.clone(),
            };

            let report = run_sync_cycle(&config, store.as_ref(), &catalog, &dispatcher).await;
            println!("sync");
            println!("  status: {}", report.status);
            if let Some(reason) = &report.reason {
                println!("  reason: {reason}");
            }
            println!("  queued: {}", report.queued);
        }

        Commands::Serve => {
            run_server(&config).await?;
        }
    }

    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}
