use anyhow::Context;
use std::path::PathBuf;
use tracing::info;

use crate::Result;
use crate::config::{Config, get_config_dir};
use crate::ingest;
use crate::ollama::OllamaClient;
use crate::query::{self, DEFAULT_QUESTION};
use crate::store;

/// Build (or rebuild) the index from the documentation tree
#[inline]
pub fn run_ingest(root: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let client = OllamaClient::new(&config).context("Failed to create Ollama client")?;

    let root = root
        .or_else(|| config.ingest.root_dir.clone())
        .map_or_else(std::env::current_dir, Ok)
        .context("Failed to resolve ingest root directory")?;

    let stats = ingest::run(&config, &client, &root)?;

    if stats.embedded == 0 {
        let url = config
            .ollama
            .ollama_url()
            .map(|u| u.to_string())
            .unwrap_or_default();
        println!("No files ingested. Check your embedding service at {url}");
        if stats.skipped > 0 {
            println!("({} files failed; see logs for details)", stats.skipped);
        }
        return Ok(());
    }

    println!(
        "Ingested {} files -> {}",
        stats.embedded,
        config.index_path().display()
    );
    if stats.skipped > 0 {
        println!("Skipped {} files; see logs for details", stats.skipped);
    }

    Ok(())
}

/// Answer a question against the persisted index
#[inline]
pub fn run_ask(words: Vec<String>) -> Result<()> {
    let question = if words.is_empty() {
        DEFAULT_QUESTION.to_string()
    } else {
        words.join(" ")
    };
    info!("Answering question: {}", question);

    let config = load_config()?;
    let client = OllamaClient::new(&config).context("Failed to create Ollama client")?;

    let result = query::run(&config, &client, &question)?;
    println!("{}", result.answer);

    Ok(())
}

/// Show connectivity and index status
#[inline]
pub fn show_status() -> Result<()> {
    let config = load_config()?;

    println!("docs-rag status");
    println!("{}", "=".repeat(40));

    match OllamaClient::new(&config) {
        Ok(client) => match client.ping() {
            Ok(()) => {
                println!(
                    "Ollama: reachable at {}:{}",
                    config.ollama.host, config.ollama.port
                );
                println!("  Embedding model: {}", config.ollama.embedding_model);
                println!("  Chat model: {}", config.ollama.chat_model);
            }
            Err(e) => println!("Ollama: unreachable - {e:#}"),
        },
        Err(e) => println!("Ollama: client error - {e:#}"),
    }

    match store::load(&config) {
        Ok((index, records)) => {
            println!(
                "Index: {} documents ({} dimensions) at {}",
                records.len(),
                index.dimension(),
                config.index_path().display()
            );
        }
        Err(_) => {
            println!("Index: not built yet (run `docs-rag ingest`)");
        }
    }

    Ok(())
}

/// Print the active configuration, or write a default config file
#[inline]
pub fn run_config(show: bool) -> Result<()> {
    let config = load_config()?;

    if show {
        let toml = toml::to_string_pretty(&config).context("Failed to render configuration")?;
        print!("{toml}");
        return Ok(());
    }

    let path = config.config_file_path();
    if path.exists() {
        println!("Configuration file: {}", path.display());
    } else {
        config.save().context("Failed to write default config")?;
        println!("Wrote default configuration to {}", path.display());
    }

    Ok(())
}

fn load_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    Ok(Config::load(config_dir)?)
}
