
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::index::FlatIndex;
use crate::ollama::OllamaClient;
use crate::store::{self, DocumentRecord};

/// Outcome of one ingest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    /// Files embedded and persisted.
    pub embedded: usize,
    /// Eligible files that failed to read or embed.
    pub skipped: usize,
}

/// Build the full index from the documentation tree rooted at `root`.
///
/// Per-file errors (unreadable file, embedding failure, dimension drift)
/// are logged and skipped; the run persists nothing only when every file
/// fails. Each run rebuilds the index and metadata wholesale.
#[inline]
pub fn run(config: &Config, client: &OllamaClient, root: &Path) -> Result<IngestStats> {
    info!("Ingesting documentation tree at {}", root.display());

    let mut vectors: Vec<Vec<f32>> = Vec::new();
    let mut records: Vec<DocumentRecord> = Vec::new();
    let mut skipped = 0usize;
    let mut expected_dimension: Option<usize> = None;

    // Stable traversal order keeps re-ingest runs byte-identical.
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!("Skipping unreadable directory entry: {}", error);
                continue;
            }
        };

        if !entry.file_type().is_file() || !has_allowed_extension(entry.path(), &config.ingest.extensions)
        {
            continue;
        }

        let byte_size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(error) => {
                warn!("Skipping {}: {}", entry.path().display(), error);
                skipped += 1;
                continue;
            }
        };
        if byte_size == 0 {
            continue;
        }

        let prefix = match read_prefix(entry.path(), config.ingest.prefix_bytes) {
            Ok(prefix) => prefix,
            Err(error) => {
                warn!("Skipping {}: {:#}", entry.path().display(), error);
                skipped += 1;
                continue;
            }
        };

        let vector = match client.embed(&prefix) {
            Ok(vector) => vector,
            Err(error) => {
                warn!(
                    "Skipping {} due to embedding failure: {:#}",
                    entry.path().display(),
                    error
                );
                skipped += 1;
                continue;
            }
        };

        // All vectors in one run must share a dimension; a divergent
        // response is a per-file failure like any other.
        match expected_dimension {
            None => expected_dimension = Some(vector.len()),
            Some(expected) if expected != vector.len() => {
                warn!(
                    "Skipping {}: embedding dimension {} does not match {}",
                    entry.path().display(),
                    vector.len(),
                    expected
                );
                skipped += 1;
                continue;
            }
            Some(_) => {}
        }

        vectors.push(vector);
        records.push(DocumentRecord {
            path: entry.path().display().to_string(),
            bytes: byte_size,
        });

        if records.len() % config.ingest.progress_interval == 0 {
            println!("Processed {} files...", records.len());
        }
    }

    if vectors.is_empty() {
        info!("No files ingested from {}", root.display());
        return Ok(IngestStats {
            embedded: 0,
            skipped,
        });
    }

    let dimension = vectors[0].len();
    let mut index = FlatIndex::new(dimension).context("Failed to create index")?;
    index
        .add_batch(&vectors)
        .context("Failed to add vectors to index")?;

    store::save(&index, &records, config).context("Failed to persist index and metadata")?;

    Ok(IngestStats {
        embedded: records.len(),
        skipped,
    })
}

/// Case-insensitive extension filter over the configured allow-list.
#[inline]
pub fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed)))
}

/// Read at most `max_bytes` from the start of the file, decoding lossily.
#[inline]
pub fn read_prefix(path: &Path, max_bytes: usize) -> Result<String> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let mut buffer = Vec::with_capacity(max_bytes);
    file.take(max_bytes as u64)
        .read_to_end(&mut buffer)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
