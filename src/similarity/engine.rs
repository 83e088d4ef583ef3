//! Stem-by-stem comparison against a reference corpus
//!
//! Work fans out on an injected rayon pool at two levels: one task per
//! uploaded stem, and within it one task per corpus entry (the corpus is
//! enumerated lazily and bridged into the pool). Records come back over a
//! channel in completion order and are sorted once every task has joined.

use super::cache::FeatureCache;
use super::cancel::CancellationToken;
use super::cosine::{cosine_similarity, CosineError};
use crate::discovery::{CorpusEntry, CorpusIndex};
use crate::error::{Result, StemsimError};
use crate::features::FeatureExtractor;
use crate::types::{
    AudioAsset, ComparisonStats, FeatureVector, SimilarityRecord, SimilarityReport, StemSet,
};
use crossbeam_channel::{unbounded, Sender};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Compares uploaded stem sets against a corpus
#[derive(Clone)]
pub struct SimilarityEngine {
    extractor: Arc<dyn FeatureExtractor>,
    pool: Arc<ThreadPool>,
}

/// Per-call shared state
struct Run<'a> {
    cache: FeatureCache,
    cancel: &'a CancellationToken,
    compared: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    unreadable_uploads: AtomicUsize,
}

impl SimilarityEngine {
    pub fn new(extractor: Arc<dyn FeatureExtractor>, pool: Arc<ThreadPool>) -> Self {
        Self { extractor, pool }
    }

    /// Extract features, rejecting vectors of the wrong length
    fn extract(&self, asset: &AudioAsset) -> Result<FeatureVector> {
        let vector = self.extractor.extract(asset)?;
        let expected = self.extractor.dim();
        if vector.dim() != expected {
            return Err(StemsimError::unreadable(
                asset.path(),
                format!(
                    "{} produced {} features, expected {}",
                    self.extractor.name(),
                    vector.dim(),
                    expected
                ),
            ));
        }
        Ok(vector)
    }

    /// Score every uploaded stem against the same-labelled stem of every
    /// corpus entry
    ///
    /// Unit-local failures (unreadable audio, zero-norm vectors) drop the
    /// affected pair and are counted in the report stats. Returns
    /// `Cancelled` if `cancel` fires before the run completes.
    pub fn compare(
        &self,
        uploaded: &StemSet,
        corpus: &CorpusIndex,
        cancel: &CancellationToken,
    ) -> Result<SimilarityReport> {
        let start = Instant::now();
        info!(
            "Comparing {} stems of '{}' against corpus {} using {}",
            uploaded.len(),
            uploaded.name,
            corpus.root().display(),
            self.extractor.name()
        );

        let run = Run {
            cache: FeatureCache::new(),
            cancel,
            compared: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            unreadable_uploads: AtomicUsize::new(0),
        };

        // Unbounded so workers never block on send while the caller waits
        // for the pool to finish
        let (tx, rx) = unbounded::<SimilarityRecord>();

        let stems: Vec<(&str, &AudioAsset)> = uploaded.iter().collect();
        self.pool.install(|| {
            stems
                .par_iter()
                .for_each_with(tx, |tx, &(label, asset)| {
                    self.compare_stem(label, asset, corpus, &run, tx);
                });
        });

        let records: Vec<SimilarityRecord> = rx.into_iter().collect();

        if cancel.is_cancelled() {
            info!("Comparison cancelled after {} records", records.len());
            return Err(StemsimError::Cancelled);
        }

        let stats = ComparisonStats {
            compared_pairs: run.compared.load(Ordering::Relaxed),
            skipped_pairs: run.skipped.load(Ordering::Relaxed),
            failed_pairs: run.failed.load(Ordering::Relaxed),
            unreadable_uploads: run.unreadable_uploads.load(Ordering::Relaxed),
        };

        let report = SimilarityReport::finalize(records, stats);
        info!(
            "Comparison finished in {:.2}s: {} records, {} pairs skipped, {} failed ({} features extracted)",
            start.elapsed().as_secs_f64(),
            report.len(),
            stats.skipped_pairs,
            stats.failed_pairs,
            run.cache.len()
        );

        Ok(report)
    }

    /// Compare one uploaded stem against the whole corpus
    fn compare_stem(
        &self,
        label: &str,
        asset: &AudioAsset,
        corpus: &CorpusIndex,
        run: &Run<'_>,
        tx: &Sender<SimilarityRecord>,
    ) {
        let uploaded = match run.cache.get_or_extract(asset, |a| self.extract(a)) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Skipping uploaded stem '{}': {}", label, e);
                run.unreadable_uploads.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        if uploaded.norm() == 0.0 {
            warn!(
                "Skipping uploaded stem '{}': {}",
                label,
                StemsimError::DegenerateVector {
                    path: asset.path().to_path_buf()
                }
            );
            run.unreadable_uploads.fetch_add(1, Ordering::Relaxed);
            return;
        }

        corpus
            .entries()
            .take_while(|_| !run.cancel.is_cancelled())
            .par_bridge()
            .for_each_with(tx.clone(), |tx, entry| {
                if run.cancel.is_cancelled() {
                    return;
                }
                match self.compare_entry(label, asset, &uploaded, &entry, run) {
                    Ok(Some(record)) => {
                        run.compared.fetch_add(1, Ordering::Relaxed);
                        // Receiver outlives the pool scope
                        let _ = tx.send(record);
                    }
                    Ok(None) => {
                        run.skipped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!("Skipping '{}' stem of {}: {}", label, entry.song_id, e);
                        run.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
    }

    /// Score one (stem, corpus entry) pair; `None` when the entry lacks the label
    fn compare_entry(
        &self,
        label: &str,
        asset: &AudioAsset,
        uploaded: &FeatureVector,
        entry: &CorpusEntry,
        run: &Run<'_>,
    ) -> Result<Option<SimilarityRecord>> {
        let Some(reference) = entry.stems.get(label) else {
            debug!("{} has no '{}' stem", entry.song_id, label);
            return Ok(None);
        };

        let reference_vector = run
            .cache
            .get_or_extract(reference, |a| self.extract(a))?;

        let score = cosine_similarity(uploaded, &reference_vector).map_err(|e| match e {
            CosineError::DegenerateLeft => StemsimError::DegenerateVector {
                path: asset.path().to_path_buf(),
            },
            CosineError::DegenerateRight => StemsimError::DegenerateVector {
                path: reference.path().to_path_buf(),
            },
            CosineError::DimensionMismatch { left, right } => StemsimError::unreadable(
                reference.path(),
                format!("feature dimension {} does not match upload's {}", right, left),
            ),
        })?;

        debug!(
            "{} vs {}: {:.4}",
            asset.path().display(),
            reference.path().display(),
            score
        );

        Ok(Some(SimilarityRecord {
            label: label.to_string(),
            uploaded: asset.clone(),
            reference_song: entry.song_id.clone(),
            reference: reference.clone(),
            score,
        }))
    }
}
