//! Per-run feature cache
//!
//! Shared by every task of one comparison. Lookups take a read lock;
//! extraction happens outside any lock and the result is stored only if no
//! other task stored one first. Two tasks racing on the same asset may both
//! extract, which costs time but not correctness.

use crate::error::Result;
use crate::types::{AudioAsset, FeatureVector};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct FeatureCache {
    vectors: RwLock<HashMap<PathBuf, Arc<FeatureVector>>>,
}

impl FeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached vector for `asset`, computing it with `extract` on a miss
    ///
    /// Failures are not cached.
    pub fn get_or_extract<F>(&self, asset: &AudioAsset, extract: F) -> Result<Arc<FeatureVector>>
    where
        F: FnOnce(&AudioAsset) -> Result<FeatureVector>,
    {
        if let Some(hit) = self.get(asset) {
            return Ok(hit);
        }

        let computed = Arc::new(extract(asset)?);

        let mut vectors = self.vectors.write().unwrap_or_else(PoisonError::into_inner);
        let stored = vectors
            .entry(asset.path().to_path_buf())
            .or_insert(computed);
        Ok(Arc::clone(stored))
    }

    pub fn get(&self, asset: &AudioAsset) -> Option<Arc<FeatureVector>> {
        self.vectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(asset.path())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.vectors.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
