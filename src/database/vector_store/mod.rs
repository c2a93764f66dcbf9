
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{IndexEntry, Metadata, PATH_KEY};
use crate::embeddings::dot;
use crate::{RagError, Result};

const INDEX_FILE_NAME: &str = "index.json";
const TEMP_FILE_NAME: &str = "index.json.tmp";
const FORMAT_VERSION: u32 = 1;

/// In-memory corpus searched by exact brute-force cosine similarity.
///
/// Vectors are expected to be L2-normalized, so the score is a plain dot product.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorStore {
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

/// An entry paired with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub entry: IndexEntry,
    pub score: f32,
}

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    format_version: u32,
    dimension: Option<usize>,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct PersistedIndex {
    format_version: u32,
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

impl VectorStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the index file inside a storage directory
    #[inline]
    pub fn index_file(location: &Path) -> PathBuf {
        location.join(INDEX_FILE_NAME)
    }

    /// Reconstruct the index persisted under `location`.
    ///
    /// A missing index file is the first-run case and yields an empty index. A file that
    /// cannot be parsed, lacks dimension metadata, or holds vectors of the wrong
    /// dimension is reported as [`RagError::CorruptIndex`].
    #[inline]
    pub fn load(location: &Path) -> Result<Self> {
        let path = Self::index_file(location);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    "No index found at {}, starting with an empty corpus",
                    path.display()
                );
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        let corrupt = |reason: String| RagError::CorruptIndex {
            path: path.clone(),
            reason,
        };

        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(format!("unreadable: {}", e)))?;
        if value.get("dimension").is_none() {
            return Err(corrupt("missing dimension metadata".to_string()));
        }
        let persisted: PersistedIndex =
            serde_json::from_value(value).map_err(|e| corrupt(format!("malformed: {}", e)))?;

        if persisted.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {}",
                persisted.format_version
            )));
        }

        match persisted.dimension {
            None if !persisted.entries.is_empty() => {
                return Err(corrupt(
                    "entries present without a recorded dimension".to_string(),
                ));
            }
            Some(0) => return Err(corrupt("recorded dimension is zero".to_string())),
            Some(dimension) => {
                if let Some((position, entry)) = persisted
                    .entries
                    .iter()
                    .enumerate()
                    .find(|(_, entry)| entry.vector.len() != dimension)
                {
                    return Err(corrupt(format!(
                        "entry {} has {} dimensions, expected {}",
                        position,
                        entry.vector.len(),
                        dimension
                    )));
                }
            }
            None => {}
        }

        info!(
            "Loaded index from {} ({} entries, dimension {:?})",
            path.display(),
            persisted.entries.len(),
            persisted.dimension
        );

        Ok(Self {
            dimension: persisted.dimension,
            entries: persisted.entries,
        })
    }

    /// Persist the full current state under `location`.
    ///
    /// The index is written to a temporary file, synced, and atomically renamed over the
    /// previous index, so an interrupted save leaves the prior state intact.
    #[inline]
    pub fn save(&self, location: &Path) -> Result<()> {
        fs::create_dir_all(location)?;

        let temp_path = location.join(TEMP_FILE_NAME);
        let final_path = Self::index_file(location);

        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(
            &mut writer,
            &PersistedIndexRef {
                format_version: FORMAT_VERSION,
                dimension: self.dimension,
                entries: &self.entries,
            },
        )
        .map_err(std::io::Error::from)?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(std::io::IntoInnerError::into_error)?
            .sync_all()?;

        fs::rename(&temp_path, &final_path)?;

        debug!(
            "Saved {} entries to {}",
            self.entries.len(),
            final_path.display()
        );
        Ok(())
    }

    /// Append entries. All three sequences must have equal length, every vector must
    /// match the index dimension (adopted from the first vector on the first add), and
    /// every metadata map must name its source path.
    ///
    /// Validation happens before any mutation; on error the index is unchanged.
    #[inline]
    pub fn add(
        &mut self,
        vectors: Vec<Vec<f32>>,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> Result<usize> {
        if vectors.len() != texts.len() || vectors.len() != metadatas.len() {
            return Err(RagError::ArityMismatch {
                vectors: vectors.len(),
                texts: texts.len(),
                metadatas: metadatas.len(),
            });
        }

        let Some(first) = vectors.first() else {
            return Ok(0);
        };

        if let Some(position) = metadatas.iter().position(|m| !m.contains_key(PATH_KEY)) {
            return Err(RagError::MissingSourcePath { position });
        }

        let expected = self.dimension.unwrap_or(first.len());
        if let Some(bad) = vectors
            .iter()
            .find(|v| v.len() != expected || v.is_empty())
        {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        let added = vectors.len();
        self.dimension = Some(expected);
        self.entries.extend(
            vectors
                .into_iter()
                .zip(texts)
                .zip(metadatas)
                .map(|((vector, text), metadata)| IndexEntry {
                    vector,
                    text,
                    metadata,
                }),
        );

        debug!("Added {} entries (total {})", added, self.entries.len());
        Ok(added)
    }

    /// Return up to `k` entries with the highest similarity to `query`, best first.
    ///
    /// Ties keep insertion order. An empty index yields an empty result.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut scored = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, dot(query, &entry.vector)))
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchResult {
                entry: self.entries[position].clone(),
                score,
            })
            .collect())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Undo adds past `len`, restoring the dimension recorded before them
    pub(crate) fn rollback(&mut self, len: usize, dimension: Option<usize>) {
        self.entries.truncate(len);
        self.dimension = dimension;
    }
}
