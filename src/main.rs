//! # Mini-RAG CLI (`mrag`)
//!
//! The `mrag` binary runs the HTTP API and offers the same operations
//! directly from the shell against the configured data directory.
//!
//! ## Usage
//!
//! ```bash
//! mrag --config ./config/mrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mrag serve` | Start the HTTP API server |
//! | `mrag upload <file>` | Ingest a PDF, DOCX, TXT, or Markdown file |
//! | `mrag query "<text>"` | Search documents and generate an answer |
//! | `mrag list` | List stored documents in upload order |
//! | `mrag delete <id>` | Delete a document (exit code 1 if unknown) |
//! | `mrag stats` | Show document and chunk counts |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mini_rag::config::{self, Config};
use mini_rag::llm::Generator;
use mini_rag::models::QueryRequest;
use mini_rag::rag::RagService;
use mini_rag::server;

/// Mini-RAG: upload documents, ask questions, get answers grounded in them.
#[derive(Parser)]
#[command(
    name = "mrag",
    about = "Mini-RAG: a small retrieval-augmented knowledge base",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server on `[server].bind`.
    Serve,

    /// Upload and ingest a document.
    Upload {
        /// File to ingest.
        file: PathBuf,
    },

    /// Ask a question over the stored documents.
    Query {
        /// Question text.
        query: String,

        /// Maximum number of source documents to use.
        #[arg(long)]
        max_results: Option<usize>,
    },

    /// List stored documents.
    List,

    /// Delete a document by id.
    Delete {
        /// Document id, as shown by `mrag list`.
        id: String,
    },

    /// Show store statistics.
    Stats,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mini_rag=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_service(cfg: &Config) -> anyhow::Result<RagService> {
    let generator = Generator::from_config(&cfg.llm)?;
    RagService::new(cfg.clone(), generator)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Upload { file } => {
            let service = open_service(&cfg)?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let doc = service.upload_document(&bytes, &filename).await?;
            println!("Uploaded {} as {}", doc.filename, doc.id);
            if let Some(summary) = doc.metadata.get("summary").and_then(|s| s.as_str()) {
                println!("Summary: {}", summary);
            }
        }
        Commands::Query { query, max_results } => {
            let service = open_service(&cfg)?;
            let mut request = QueryRequest::new(query);
            request.max_results = max_results;
            let response = service.query(request).await?;

            println!("{}", response.answer);
            if !response.sources.is_empty() {
                println!();
                println!("Sources:");
                for (i, src) in response.sources.iter().enumerate() {
                    println!(
                        "{}. [{}] {} (id: {})",
                        i + 1,
                        src.score,
                        src.source,
                        src.document_id
                    );
                }
            }
        }
        Commands::List => {
            let service = open_service(&cfg)?;
            let docs = service.list_documents().await?;
            if docs.is_empty() {
                println!("No documents.");
            }
            for doc in docs {
                println!(
                    "{}  {}  {}  chunks={}",
                    doc.id,
                    doc.upload_time.to_rfc3339(),
                    doc.filename,
                    doc.metadata["chunks_count"]
                );
            }
        }
        Commands::Delete { id } => {
            let service = open_service(&cfg)?;
            if service.delete_document(&id).await? {
                println!("Deleted {}", id);
            } else {
                eprintln!("Document not found: {}", id);
                std::process::exit(1);
            }
        }
        Commands::Stats => {
            let service = open_service(&cfg)?;
            let stats = service.system_stats().await?;
            println!("Documents: {}", stats.total_documents);
            println!("Chunks:    {}", stats.total_chunks);
            println!(
                "Storage:   {} ({})",
                stats.document_store_stats.storage_type,
                stats.document_store_stats.markdown_directory
            );
            println!("Status:    {}", stats.system_status);
        }
    }

    Ok(())
}
