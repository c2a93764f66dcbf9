use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lecture_rag::commands::{ask, ingest, show_status};
use lecture_rag::config::{Config, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "lecture-rag")]
#[command(about = "Ask questions about your lecture notes, with optional web context")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the index (defaults to $LECTURE_RAG_HOME, then the
    /// platform config directory)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama, chunking and web search
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest a lecture file or a directory of lecture files
    Ingest {
        /// File or directory to ingest
        path: PathBuf,
    },
    /// Ask a question about the ingested lectures
    Ask {
        question: String,
        /// Number of lecture excerpts to retrieve
        #[arg(long)]
        k: Option<usize>,
        /// Answer from the lectures only
        #[arg(long)]
        no_web: bool,
    },
    /// Show index and model status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = Config::resolve_base_dir(cli.base_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Ingest { path } => {
            ingest(&base_dir, &path).await?;
        }
        Commands::Ask {
            question,
            k,
            no_web,
        } => {
            ask(&base_dir, &question, k, no_web).await?;
        }
        Commands::Status => {
            show_status(&base_dir).await?;
        }
    }

    Ok(())
}
