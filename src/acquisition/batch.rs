//! Corpus acquisition: search, download, and separate in parallel

use super::jamendo::{DownloadOutcome, JamendoClient, TrackDescriptor, TrackQuery};
use crate::error::Result;
use crate::separation::StemSeparator;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Counts for one acquisition run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionSummary {
    pub requested: usize,
    pub downloaded: usize,
    pub cached: usize,
    pub separated: usize,
    pub failed: usize,
}

/// Where acquired tracks end up
pub struct AcquisitionTarget<'a> {
    /// Directory the source mp3 files are kept in
    pub download_dir: &'a Path,
    /// Corpus root that receives one separation output root per track
    pub corpus_root: &'a Path,
    pub show_progress: bool,
}

/// Search for `query` and bring every result into the corpus
///
/// Tracks that fail to download or separate are logged and counted; the
/// batch continues.
pub fn acquire_corpus(
    client: &JamendoClient,
    separator: &dyn StemSeparator,
    pool: &ThreadPool,
    query: &TrackQuery,
    target: &AcquisitionTarget<'_>,
) -> Result<AcquisitionSummary> {
    let tracks = client.search(query)?;
    if tracks.is_empty() {
        warn!("No tracks found for genre '{}'", query.genre);
        return Ok(AcquisitionSummary::default());
    }

    Ok(process_tracks(client, separator, pool, &tracks, target))
}

fn process_tracks(
    client: &JamendoClient,
    separator: &dyn StemSeparator,
    pool: &ThreadPool,
    tracks: &[TrackDescriptor],
    target: &AcquisitionTarget<'_>,
) -> AcquisitionSummary {
    let progress_bar = if target.show_progress {
        let pb = ProgressBar::new(tracks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let downloaded = AtomicUsize::new(0);
    let cached = AtomicUsize::new(0);
    let separated = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    pool.install(|| {
        tracks.par_iter().for_each(|track| {
            let result = client
                .download(track, target.download_dir)
                .and_then(|outcome| {
                    match &outcome {
                        DownloadOutcome::Downloaded(_) => downloaded.fetch_add(1, Ordering::Relaxed),
                        DownloadOutcome::Cached(_) => cached.fetch_add(1, Ordering::Relaxed),
                    };
                    separate_track(separator, outcome.path(), target.corpus_root)
                });

            match result {
                Ok(true) => {
                    separated.fetch_add(1, Ordering::Relaxed);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to acquire {} ({}): {}", track.name, track.id, e);
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            }

            if let Some(ref pb) = progress_bar {
                pb.set_message(track.name.clone());
                pb.inc(1);
            }
        });
    });

    if let Some(pb) = progress_bar {
        pb.finish_with_message("done");
    }

    let summary = AcquisitionSummary {
        requested: tracks.len(),
        downloaded: downloaded.into_inner(),
        cached: cached.into_inner(),
        separated: separated.into_inner(),
        failed: failed.into_inner(),
    };
    info!(
        "Acquired {} tracks: {} downloaded, {} cached, {} separated, {} failed",
        summary.requested, summary.downloaded, summary.cached, summary.separated, summary.failed
    );
    summary
}

/// Separate `audio` into the corpus unless its stems are already there
///
/// Returns whether separation ran.
fn separate_track(separator: &dyn StemSeparator, audio: &Path, corpus_root: &Path) -> Result<bool> {
    if separator.is_separated(audio, corpus_root) {
        debug!("{} already separated, skipping", audio.display());
        return Ok(false);
    }
    separator.separate(audio, corpus_root)?;
    Ok(true)
}
