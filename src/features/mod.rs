//! Acoustic feature extraction
//!
//! A trait seam plus the MFCC-mean implementation used in production.

pub mod extractor;
pub mod mfcc;
pub mod traits;

pub use extractor::MfccExtractor;
pub use traits::FeatureExtractor;
