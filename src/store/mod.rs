
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::{debug, info};

use crate::config::Config;
use crate::index::FlatIndex;

/// One ingested document. The position of a record in the metadata list
/// is the row of its vector in the similarity index; the two files are
/// only ever written and read as a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub path: String,
    pub bytes: u64,
}

/// Persist the index and its parallel metadata list to the configured
/// paths, replacing any previous pair wholesale.
#[inline]
pub fn save(index: &FlatIndex, records: &[DocumentRecord], config: &Config) -> Result<()> {
    if index.len() != records.len() {
        bail!(
            "Refusing to persist: index holds {} vectors but {} metadata records",
            index.len(),
            records.len()
        );
    }

    fs::create_dir_all(&config.base_dir).with_context(|| {
        format!("Failed to create data directory: {}", config.base_dir.display())
    })?;

    let index_path = config.index_path();
    index
        .save(&index_path)
        .with_context(|| format!("Failed to write index to {}", index_path.display()))?;

    let metadata_path = config.metadata_path();
    let json = serde_json::to_string(records).context("Failed to serialize metadata")?;
    fs::write(&metadata_path, json)
        .with_context(|| format!("Failed to write metadata to {}", metadata_path.display()))?;

    info!(
        "Persisted {} documents to {} and {}",
        records.len(),
        index_path.display(),
        metadata_path.display()
    );
    Ok(())
}

/// Load the persisted index/metadata pair, verifying that the row counts
/// still line up. A missing or corrupt file is an ordinary error here,
/// not a crash; callers report it with a hint to re-run ingest.
#[inline]
pub fn load(config: &Config) -> Result<(FlatIndex, Vec<DocumentRecord>)> {
    let index_path = config.index_path();
    let index = FlatIndex::load(&index_path).with_context(|| {
        format!(
            "Failed to load index from {} (run `docs-rag ingest` first)",
            index_path.display()
        )
    })?;

    let metadata_path = config.metadata_path();
    let json = fs::read_to_string(&metadata_path).with_context(|| {
        format!(
            "Failed to read metadata from {} (run `docs-rag ingest` first)",
            metadata_path.display()
        )
    })?;
    let records: Vec<DocumentRecord> =
        serde_json::from_str(&json).context("Failed to parse metadata JSON")?;

    if index.len() != records.len() {
        bail!(
            "Index/metadata mismatch: {} vectors vs {} records; re-run ingest",
            index.len(),
            records.len()
        );
    }

    debug!("Loaded {} documents from disk", records.len());
    Ok((index, records))
}
