//! Core data types for stemsim
//!
//! These types represent the domain model and flow through the pipeline.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// =============================================================================
// Audio assets and stem sets
// =============================================================================

/// A playable audio file, identified by its path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AudioAsset {
    path: PathBuf,
}

impl AudioAsset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The stems separated from one song, keyed by stem label
///
/// Labels are whatever file stems the separation tool wrote ("vocals",
/// "drums", "guitar", ...). They are unique within a set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StemSet {
    /// Song folder name as written by the separation tool
    pub name: String,
    /// Directory holding the stem files
    pub dir: PathBuf,
    stems: BTreeMap<String, AudioAsset>,
}

impl StemSet {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            stems: BTreeMap::new(),
        }
    }

    /// Add a stem; returns the asset already holding this label, if any
    pub fn insert(&mut self, label: impl Into<String>, asset: AudioAsset) -> Option<AudioAsset> {
        let label = label.into();
        match self.stems.entry(label) {
            btree_map::Entry::Occupied(existing) => Some(existing.get().clone()),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(asset);
                None
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<&AudioAsset> {
        self.stems.get(label)
    }

    /// Stems in label order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AudioAsset)> {
        self.stems.iter().map(|(label, asset)| (label.as_str(), asset))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.stems.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }
}

// =============================================================================
// Features and similarity
// =============================================================================

/// Mean timbral profile of one audio asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Euclidean norm, accumulated in f64
    pub fn norm(&self) -> f64 {
        self.0
            .iter()
            .map(|&v| (v as f64) * (v as f64))
            .sum::<f64>()
            .sqrt()
    }
}

/// One scored (uploaded stem, reference stem) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    /// Stem label shared by both sides
    pub label: String,
    pub uploaded: AudioAsset,
    /// Corpus entry the reference stem belongs to
    pub reference_song: String,
    pub reference: AudioAsset,
    /// Cosine similarity in [-1, 1]
    pub score: f64,
}

/// Counters describing one comparison run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonStats {
    /// Pairs scored and emitted
    pub compared_pairs: usize,
    /// (stem, entry) pairs where the entry lacks the stem label
    pub skipped_pairs: usize,
    /// Pairs dropped for unreadable audio or a degenerate vector
    pub failed_pairs: usize,
    /// Uploaded stems whose own features could not be extracted
    pub unreadable_uploads: usize,
}

/// Finalized result of comparing one stem set against a corpus
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityReport {
    pub records: Vec<SimilarityRecord>,
    pub stats: ComparisonStats,
}

impl SimilarityReport {
    /// Sort records into the canonical order: stem label ascending, score
    /// descending, then reference song ascending
    pub fn finalize(mut records: Vec<SimilarityRecord>, stats: ComparisonStats) -> Self {
        records.sort_by(canonical_order);
        Self { records, stats }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records for a single stem label, best match first
    pub fn for_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a SimilarityRecord> {
        self.records.iter().filter(move |r| r.label == label)
    }
}

fn canonical_order(a: &SimilarityRecord, b: &SimilarityRecord) -> Ordering {
    a.label
        .cmp(&b.label)
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.reference_song.cmp(&b.reference_song))
        .then_with(|| a.reference.cmp(&b.reference))
}

// =============================================================================
// Audio buffer types
// =============================================================================

/// Decoded mono samples at the file's native sample rate
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Mono samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration: f64,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        // Guard against division by zero - use 0 duration for invalid sample rate
        let duration = if sample_rate > 0 {
            samples.len() as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self {
            samples,
            sample_rate,
            duration,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// =============================================================================
// Supported formats
// =============================================================================

/// Audio formats a stem file may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Aiff,
    Ogg,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "aiff" | "aif" => Some(AudioFormat::Aiff),
            "ogg" => Some(AudioFormat::Ogg),
            _ => None,
        }
    }

    /// Check if a path has a supported extension
    pub fn is_supported_path(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .is_some()
    }
}
