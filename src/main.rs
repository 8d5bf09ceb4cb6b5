use clap::{Parser, Subcommand};
use docs_rag::Result;
use docs_rag::commands::{run_ask, run_config, run_ingest, show_status};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docs-rag")]
#[command(about = "Retrieval-augmented question answering over a local documentation tree")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed the documentation tree and build the similarity index
    Ingest {
        /// Root directory to scan (defaults to the configured root, then
        /// the current directory)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Ask a question grounded in the indexed documents
    Ask {
        /// The question, as trailing free text
        #[arg(trailing_var_arg = true)]
        question: Vec<String>,
    },
    /// Show Ollama connectivity and index status
    Status,
    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { root } => run_ingest(root)?,
        Commands::Ask { question } => run_ask(question)?,
        Commands::Status => show_status()?,
        Commands::Config { show } => run_config(show)?,
    }

    Ok(())
}
