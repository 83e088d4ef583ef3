//! Stem set and corpus discovery

pub mod corpus;
pub mod locator;

pub use corpus::{CorpusEntries, CorpusEntry, CorpusIndex};
pub use locator::{StemSetLocator, DEFAULT_WRAPPER};
