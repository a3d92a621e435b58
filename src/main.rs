//! # PDF Context CLI (`pdfctx`)
//!
//! ## Usage
//!
//! ```bash
//! pdfctx --config ./pdfctx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdfctx sync` | Reconcile the index with the source folder |
//! | `pdfctx ask [QUERY]` | Sync, retrieve context, and ask the chat model |
//! | `pdfctx context QUERY` | Print the context a query would retrieve |
//! | `pdfctx status` | List synchronized documents and the entry count |
//! | `pdfctx reset` | Delete every index entry and the metadata snapshot |
//!
//! Without `--config`, built-in defaults are used (source folder `docs/`,
//! metadata in `metadata.json`, SQLite index under `data/`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pdf_context::{chat, config, logging, retrieve, status, sync};

/// PDF Context: keep a page index in step with a folder of PDFs and ask
/// questions grounded on it.
#[derive(Parser)]
#[command(name = "pdfctx", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging for this crate on stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one synchronization pass.
    ///
    /// New and modified documents are (re)indexed page by page, removed
    /// documents lose their entries, and the metadata snapshot is updated.
    Sync,

    /// Ask a question grounded on the indexed documents.
    ///
    /// Reads the question from stdin when QUERY is omitted.
    Ask {
        /// The question. Omit to read one line from stdin.
        query: Option<String>,

        /// Skip the synchronization pass before answering.
        #[arg(long)]
        skip_sync: bool,
    },

    /// Print the context block a query would hand to the model.
    Context {
        query: String,

        /// Number of entries to retrieve (defaults to `retrieval.top_k`).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        top_k: Option<u64>,
    },

    /// List synchronized documents and the number of index entries.
    Status,

    /// Delete every index entry and the metadata snapshot.
    Reset,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let cfg = config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync => sync::run_sync(&cfg).await?,
        Commands::Ask { query, skip_sync } => chat::run_ask(&cfg, query, skip_sync).await?,
        Commands::Context { query, top_k } => {
            retrieve::run_context(&cfg, &query, top_k.map(|k| k as usize)).await?
        },
        Commands::Status => status::run_status(&cfg).await?,
        Commands::Reset => status::run_reset(&cfg).await?,
    }

    Ok(())
}
