
use bincode::config::standard as bincode_config;
use bincode::{Decode, Encode, decode_from_slice, encode_to_vec};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Flat (exact) similarity index over fixed-dimension vectors.
///
/// Vectors are stored row-major in a single buffer; search is a
/// brute-force scan under squared Euclidean distance. Row `i` corresponds
/// to the `i`-th document record kept alongside the index by the store.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

/// A single nearest-neighbor hit. `distance` is squared L2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub distance: f32,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Index dimension must be non-zero")]
    ZeroDimension,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode index: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("Failed to decode index file: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("Corrupt index file: {0}")]
    Corrupt(String),
}

impl FlatIndex {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    /// Number of vectors stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Append all rows in one bulk call. Every row must match the index
    /// dimension; the batch is rejected wholesale on the first mismatch
    /// so a partial add can never desync the index from its metadata.
    #[inline]
    pub fn add_batch(&mut self, rows: &[Vec<f32>]) -> Result<(), IndexError> {
        for row in rows {
            if row.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: row.len(),
                });
            }
        }

        self.data.reserve(rows.len() * self.dimension);
        for row in rows {
            self.data.extend_from_slice(row);
        }

        debug!("Added {} vectors, index now holds {}", rows.len(), self.len());
        Ok(())
    }

    /// Brute-force k-nearest-neighbor search, nearest first.
    ///
    /// `k` is clamped to the number of stored vectors, so an under-sized
    /// corpus returns fewer hits rather than padded sentinel rows. Ties
    /// on distance resolve to the lower row id.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, vector)| Neighbor {
                row,
                distance: squared_l2(query, vector),
            })
            .collect();

        neighbors
            .sort_unstable_by(|a, b| a.distance.total_cmp(&b.distance).then(a.row.cmp(&b.row)));
        neighbors.truncate(k.min(self.len()));

        Ok(neighbors)
    }

    /// Serialize the whole index to a single binary file.
    #[inline]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), IndexError> {
        let bytes = encode_to_vec(self, bincode_config())?;
        fs::write(path.as_ref(), bytes)?;
        debug!(
            "Saved index with {} vectors to {}",
            self.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Load an index previously written by [`FlatIndex::save`].
    ///
    /// A file that decodes but describes an impossible structure is
    /// rejected here, so every later `len()`/`search()` call can rely on
    /// a non-zero dimension and whole rows.
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let bytes = fs::read(path.as_ref())?;
        let (index, _): (Self, usize) = decode_from_slice(&bytes, bincode_config())?;

        if index.dimension == 0 {
            return Err(IndexError::Corrupt("index dimension is zero".to_string()));
        }
        if index.data.len() % index.dimension != 0 {
            return Err(IndexError::Corrupt(format!(
                "vector data length {} is not a multiple of dimension {}",
                index.data.len(),
                index.dimension
            )));
        }

        debug!(
            "Loaded index with {} vectors from {}",
            index.len(),
            path.as_ref().display()
        );
        Ok(index)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
