//! # Image Store
//! Sample images held in memory with their input tensors precomputed.
//!
//! Built once during startup and shared read-only (`Arc<ImageStore>`) while
//! serving. Reloading must build a fresh store and swap the `Arc`, never
//! mutate one that readers can see.

use crate::codec::TensorCodec;
use crate::error::{IngestError, StoreError};
use crate::types::ImageRecord;
use rand::Rng;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Default)]
pub struct ImageStore {
    records: HashMap<String, ImageRecord>,
    /// Dense `0..N` index over `records` for uniform sampling
    index: Vec<String>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any record with the same id.
    pub fn insert(&mut self, record: ImageRecord) {
        let id = record.id.clone();
        if self.records.insert(id.clone(), record).is_none() {
            self.index.push(id);
        }
    }

    /// Load every eligible image in `dir`.
    ///
    /// Files that cannot be read or decoded are logged and skipped. Returns
    /// how many images this call added; fails if the store ends up empty.
    pub fn ingest(
        &mut self,
        dir: &Path,
        codec: &dyn TensorCodec,
        extensions: &[String],
    ) -> Result<usize, IngestError> {
        let entries = std::fs::read_dir(dir).map_err(|source| IngestError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| readable_entry(dir, entry))
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_extension(path, extensions))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let Some(id) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                tracing::warn!(path = %path.display(), "Skipping image with non UTF-8 name");
                continue;
            };

            let raw = match std::fs::read(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read image");
                    continue;
                }
            };

            match codec.normalize(&raw) {
                Ok(tensor) => {
                    self.insert(ImageRecord::new(id, raw, tensor));
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to generate tensor from file"
                    );
                }
            }
        }

        if self.is_empty() {
            return Err(IngestError::NoImages(dir.to_path_buf()));
        }

        tracing::info!(loaded, total = self.size(), dir = %dir.display(), "Ingested images");
        Ok(loaded)
    }

    /// Uniformly random id of a stored image
    pub fn sample(&self) -> Result<&str, StoreError> {
        self.sample_with(&mut rand::rng())
    }

    pub fn sample_with<R: Rng>(&self, rng: &mut R) -> Result<&str, StoreError> {
        if self.index.is_empty() {
            return Err(StoreError::EmptyStore);
        }
        let i = rng.random_range(0..self.index.len());
        Ok(&self.index[i])
    }

    pub fn get(&self, id: &str) -> Result<&ImageRecord, StoreError> {
        self.records
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub fn size(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.index.iter().map(String::as_str)
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

/// Entries the directory iterator could not read are logged and skipped.
fn readable_entry<T>(dir: &Path, entry: std::io::Result<T>) -> Option<T> {
    match entry {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to read directory entry");
            None
        }
    }
}
