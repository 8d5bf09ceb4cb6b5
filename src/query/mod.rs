
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::config::Config;
use crate::index::Neighbor;
use crate::ingest::read_prefix;
use crate::ollama::OllamaClient;
use crate::store::{self, DocumentRecord};

/// Question used when the CLI is given no trailing arguments.
pub const DEFAULT_QUESTION: &str = "List all entity names.";

/// Number of documents retrieved as context for the chat request.
pub const CONTEXT_DOCUMENTS: usize = 3;

/// An answered question, with the paths that grounded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub answer: String,
    pub context_paths: Vec<String>,
}

/// Answer `question` using the persisted index as retrieval context.
///
/// Unlike ingest, every failure here is fatal: there is no useful answer
/// without the index, the question's own embedding, or the chat call.
#[inline]
pub fn run(config: &Config, client: &OllamaClient, question: &str) -> Result<QueryResult> {
    let (index, records) = store::load(config)?;
    info!("Answering against {} indexed documents", records.len());

    let query_vector = client
        .embed(question)
        .context("Failed to embed the question")?;

    let hits = index
        .search(&query_vector, CONTEXT_DOCUMENTS)
        .context("Index search failed")?;
    debug!("Retrieved {} context documents", hits.len());

    let (context, context_paths) =
        build_context(&hits, &records, config.ingest.prefix_bytes)?;

    let prompt = format!("{context}\n\n{question}");
    let answer = client.chat(&prompt).context("Chat completion failed")?;

    Ok(QueryResult {
        answer,
        context_paths,
    })
}

/// Re-read the current prefix of each hit's file and join the blocks
/// with a blank line. Context deliberately reflects what is on disk now,
/// not what was embedded at ingest time.
#[inline]
pub fn build_context(
    hits: &[Neighbor],
    records: &[DocumentRecord],
    prefix_bytes: usize,
) -> Result<(String, Vec<String>)> {
    let mut blocks = Vec::with_capacity(hits.len());
    let mut paths = Vec::with_capacity(hits.len());

    for hit in hits {
        let record = records.get(hit.row).with_context(|| {
            format!("Search returned row {} outside the metadata list", hit.row)
        })?;

        let block = read_prefix(Path::new(&record.path), prefix_bytes)
            .with_context(|| format!("Failed to read context file {}", record.path))?;

        blocks.push(block);
        paths.push(record.path.clone());
    }

    Ok((blocks.join("\n\n"), paths))
}
