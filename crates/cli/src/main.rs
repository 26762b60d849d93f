//! QuickList CLI - Database migrations and catalog management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! ql-cli migrate
//!
//! # Sync the catalog from a terms file (YAML list of search terms)
//! ql-cli sync --terms-file terms.yaml
//!
//! # Sync a couple of ad-hoc terms
//! ql-cli sync --term "vintage denim jacket" --term "noise cancelling headphones"
//!
//! # Refresh every existing product by its identifying code
//! ql-cli sync --refresh
//!
//! # Trigger a full matching-index rebuild
//! ql-cli index rebuild
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `sync` - Run the catalog sync job
//! - `index rebuild` - Trigger a full matching-index rebuild

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ql-cli")]
#[command(author, version, about = "QuickList CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Run the catalog sync job
    Sync {
        /// YAML file containing a list of search terms
        #[arg(long)]
        terms_file: Option<String>,

        /// Ad-hoc search term (repeatable)
        #[arg(long = "term")]
        terms: Vec<String>,

        /// Refresh existing products by their identifying codes instead of
        /// searching new terms
        #[arg(long)]
        refresh: bool,
    },
    /// Manage the external matching index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Trigger a full index rebuild from the catalog store
    Rebuild,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sync {
            terms_file,
            terms,
            refresh,
        } => {
            commands::sync::run(terms_file.as_deref(), &terms, refresh).await?;
        }
        Commands::Index { action } => match action {
            IndexAction::Rebuild => commands::index::rebuild().await?,
        },
    }
    Ok(())
}
