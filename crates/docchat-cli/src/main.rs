//! docchat CLI - Ask questions about a document
//!
//! Usage:
//!   docchat [chat]
//!   docchat ask <question>
//!   docchat build [--rebuild]
//!   docchat status

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docchat_core::{AppConfig, LoggingConfig};
use docchat_rag::DocChat;
use docchat_vector::{LocalVectorStore, VectorStore};
use tracing_subscriber::EnvFilter;

mod shell;

#[derive(Parser)]
#[command(name = "docchat")]
#[command(about = "Retrieval-augmented chat over a PDF document")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Document to answer questions about
    #[arg(long, global = true)]
    document: Option<PathBuf>,

    /// Directory holding the vector store
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Collection name
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Passages retrieved per question
    #[arg(long, global = true)]
    top_k: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive question loop (default)
    Chat,
    /// Answer one question and exit
    Ask {
        /// Question to ask
        question: String,

        /// Print the answer and retrieved passages as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build the document collection, or load it if it already exists
    Build {
        /// Delete the collection and build it again
        #[arg(long)]
        rebuild: bool,
    },
    /// Show the collection and its record count (read-only)
    Status,
}

/// Defaults, then the config file, then the environment, then flags
fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };

    if let Some(document) = &cli.document {
        config.document.path = document.clone();
    }
    if let Some(dir) = &cli.store_dir {
        config.store.directory = dir.clone();
    }
    if let Some(collection) = &cli.collection {
        config.store.collection = collection.clone();
    }
    if let Some(top_k) = cli.top_k {
        config.retrieval.top_k = top_k;
    }

    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).context("Failed to load configuration")?;
    init_tracing(&config.logging);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let chat = DocChat::from_config(&config).await?;

            match chat.ensure_ready().await {
                Ok(report) => tracing::info!(
                    "Collection '{}' ready ({} records)",
                    chat.collection(),
                    report.records
                ),
                Err(e) => eprintln!("[error] Could not prepare the document: {e}"),
            }

            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            shell::run(stdin, tokio::io::stdout(), &chat).await?;
        }
        Commands::Ask { question, json } => {
            let chat = DocChat::from_config(&config).await?;
            let response = chat.ask_detailed(&question).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.answer);
            }
        }
        Commands::Build { rebuild } => {
            let chat = DocChat::from_config(&config).await?;
            let report = if rebuild {
                chat.rebuild().await?
            } else {
                chat.ensure_ready().await?
            };

            let action = if report.built { "Built" } else { "Loaded" };
            println!(
                "{action} collection '{}' with {} records",
                chat.collection(),
                report.records
            );
        }
        Commands::Status => {
            config.validate_pipeline()?;
            let collection = &config.store.collection;
            let records = if config.store.directory.is_dir() {
                let store = LocalVectorStore::from_config(&config.store).await?;
                if store.collection_exists(collection).await? {
                    store.count(collection).await?
                } else {
                    0
                }
            } else {
                0
            };

            println!("Store:      {}", config.store.directory.display());
            println!("Collection: {}", config.store.collection);
            println!("Records:    {records}");
            println!("Document:   {}", config.document.path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "docchat",
            "ask",
            "What is covered?",
            "--top-k",
            "6",
            "--collection",
            "manual",
        ])
        .unwrap();

        assert_eq!(cli.top_k, Some(6));
        assert_eq!(cli.collection.as_deref(), Some("manual"));
        assert!(matches!(
            cli.command,
            Some(Commands::Ask { ref question, json: false }) if question == "What is covered?"
        ));
    }

    #[test]
    fn test_chat_is_default() {
        let cli = Cli::try_parse_from(["docchat"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_build_rebuild_flag() {
        let cli = Cli::try_parse_from(["docchat", "build", "--rebuild"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Build { rebuild: true })));
    }
}
