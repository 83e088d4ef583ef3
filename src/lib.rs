//! stemsim - stem-wise audio similarity search
//!
//! Splits an uploaded track into stems with an external separator, then
//! scores each stem against the same-labelled stem of every song in a
//! local reference corpus using MFCC feature vectors and cosine similarity.
//!
//! # Architecture
//!
//! - `config`: CLI argument parsing and runtime settings
//! - `discovery`: Stem set location and corpus enumeration
//! - `audio`: Audio decoding using symphonia
//! - `features`: MFCC feature extraction (swappable via `FeatureExtractor`)
//! - `similarity`: Concurrent comparison engine
//! - `separation`: External separator invocation
//! - `acquisition`: Corpus download from the Jamendo API
//! - `pipeline`: Request orchestration
//! - `export`: JSON report output
//!
//! # Example
//!
//! ```no_run
//! use stemsim::config::Settings;
//! use stemsim::pipeline::{self, UploadSource};
//! use stemsim::similarity::CancellationToken;
//!
//! let settings = Settings::default();
//! let separator = pipeline::build_separator(&settings).expect("bad separator");
//! let pool = pipeline::build_worker_pool(settings.worker_threads).expect("no pool");
//! let source = UploadSource::Audio("song.mp3".into());
//! let outcome = pipeline::compare_upload(
//!     &settings,
//!     &source,
//!     &separator,
//!     pool,
//!     &CancellationToken::new(),
//! )
//! .expect("comparison failed");
//! println!("{} similarity records", outcome.report.len());
//! ```

pub mod acquisition;
pub mod audio;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod features;
pub mod pipeline;
pub mod separation;
pub mod similarity;
pub mod types;

// Re-export key types at crate root
pub use error::{Result, StemsimError};
pub use types::{AudioAsset, FeatureVector, SimilarityRecord, SimilarityReport, StemSet};
