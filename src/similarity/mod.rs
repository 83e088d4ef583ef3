//! Similarity scoring
//!
//! - `cosine`: the pairwise score
//! - `cache`: per-run feature cache shared across concurrent tasks
//! - `cancel`: cooperative cancellation flag
//! - `engine`: the concurrent stem-by-stem comparison

pub mod cache;
pub mod cancel;
pub mod cosine;
pub mod engine;

pub use cache::FeatureCache;
pub use cancel::CancellationToken;
pub use cosine::{cosine_similarity, CosineError};
pub use engine::SimilarityEngine;
