//! Feature extraction trait abstraction
//!
//! The similarity engine only sees this trait, so the MFCC backend can be
//! swapped (or stubbed in tests) without touching the engine.

use crate::error::Result;
use crate::types::{AudioAsset, FeatureVector};

/// Acoustic feature backend
pub trait FeatureExtractor: Send + Sync {
    /// Extract one fixed-length vector describing the whole asset
    ///
    /// Fails with `UnreadableAudio` if the file cannot be decoded.
    fn extract(&self, asset: &AudioAsset) -> Result<FeatureVector>;

    /// Length of every vector this extractor returns
    fn dim(&self) -> usize;

    /// Get the name of this extractor (for logging)
    fn name(&self) -> &'static str;
}
