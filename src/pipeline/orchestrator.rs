//! Pipeline orchestration
//!
//! Coordinates separation of the upload, stem set discovery, corpus
//! comparison, and export. Corpus acquisition runs the same pool.

use crate::acquisition::{self, AcquisitionSummary, AcquisitionTarget, JamendoClient, TrackQuery};
use crate::config::{CompareArgs, FetchSettings, Settings};
use crate::discovery::{CorpusEntry, CorpusIndex, StemSetLocator};
use crate::error::{Result, StemsimError};
use crate::export;
use crate::features::MfccExtractor;
use crate::separation::{DemucsSeparator, StemSeparator};
use crate::similarity::{CancellationToken, SimilarityEngine};
use crate::types::SimilarityReport;
use rayon::ThreadPool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// What the caller uploaded
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// Audio file that still has to be separated
    Audio(PathBuf),
    /// Song root produced by an earlier separation
    StemsDir(PathBuf),
}

impl UploadSource {
    pub fn from_args(args: &CompareArgs) -> Result<Self> {
        match (&args.stems_dir, &args.file) {
            (Some(dir), _) => Ok(UploadSource::StemsDir(dir.clone())),
            (None, Some(file)) => Ok(UploadSource::Audio(file.clone())),
            (None, None) => Err(StemsimError::ConfigError(
                "Either an upload file or --stems-dir is required".to_string(),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            UploadSource::Audio(p) | UploadSource::StemsDir(p) => p,
        }
    }
}

/// Result of one comparison request
#[derive(Debug)]
pub struct CompareOutcome {
    pub report: SimilarityReport,
    /// Song root the uploaded stems were found under
    pub song_root: PathBuf,
}

/// Build the worker pool shared by comparison and acquisition
pub fn build_worker_pool(num_threads: usize) -> Result<Arc<ThreadPool>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .thread_name(|i| format!("stemsim-worker-{}", i))
        .build()
        .map_err(|e| StemsimError::ConfigError(format!("Failed to build worker pool: {}", e)))?;
    debug!("Configured worker pool with {} threads", pool.current_num_threads());
    Ok(Arc::new(pool))
}

/// Build the configured command-line separator
pub fn build_separator(settings: &Settings) -> Result<DemucsSeparator> {
    DemucsSeparator::new(
        settings.separator.command.clone(),
        settings.separator.model.clone(),
        settings.separator.timeout,
    )
}

/// Separate (if needed), locate, and compare an upload against the corpus
///
/// Failures before comparison starts (missing corpus, separation, stem set
/// discovery) fail the whole request. An empty report is a success.
pub fn compare_upload(
    settings: &Settings,
    source: &UploadSource,
    separator: &dyn StemSeparator,
    pool: Arc<ThreadPool>,
    cancel: &CancellationToken,
) -> Result<CompareOutcome> {
    let pipeline_start = Instant::now();

    if !settings.corpus_dir.is_dir() {
        return Err(StemsimError::CorpusNotFound(settings.corpus_dir.clone()));
    }

    let song_root = match source {
        UploadSource::Audio(file) => {
            if !file.is_file() {
                return Err(StemsimError::FileNotFound(file.clone()));
            }
            info!("Separating upload with {}", separator.name());
            separator.separate(file, &settings.work_dir)?
        }
        UploadSource::StemsDir(dir) => dir.clone(),
    };

    if cancel.is_cancelled() {
        return Err(StemsimError::Cancelled);
    }

    let locator = StemSetLocator::new(settings.separator.model.clone());
    let uploaded = locator.locate(&song_root)?;
    info!(
        "Uploaded stems: {}",
        uploaded.labels().collect::<Vec<_>>().join(", ")
    );

    let corpus = CorpusIndex::new(&settings.corpus_dir, locator);
    let extractor = Arc::new(MfccExtractor::new(settings.n_mfcc));
    let engine = SimilarityEngine::new(extractor, pool);
    let report = engine.compare(&uploaded, &corpus, cancel)?;

    info!(
        "Total pipeline time: {:.2}s",
        pipeline_start.elapsed().as_secs_f64()
    );

    Ok(CompareOutcome { report, song_root })
}

/// Write the report to `output`, or return it as a JSON string for stdout
pub fn export_report(
    outcome: &CompareOutcome,
    source: &UploadSource,
    settings: &Settings,
    output: Option<&Path>,
) -> Result<Option<String>> {
    match output {
        Some(path) => {
            export::write_report(&outcome.report, source.path(), &settings.corpus_dir, path)?;
            Ok(None)
        }
        None => export::to_json_string(&outcome.report, source.path(), &settings.corpus_dir)
            .map(Some),
    }
}

/// Search, download, and separate tracks into the corpus
pub fn run_fetch(settings: &Settings, fetch: &FetchSettings) -> Result<AcquisitionSummary> {
    let client = JamendoClient::new(&fetch.api_base, &fetch.client_id, fetch.request_interval)?;
    let separator = build_separator(settings)?;
    let pool = build_worker_pool(settings.worker_threads)?;

    std::fs::create_dir_all(&settings.corpus_dir)
        .map_err(|e| StemsimError::output_error(&settings.corpus_dir, e))?;

    let query = TrackQuery {
        genre: fetch.genre.clone(),
        limit: fetch.limit,
        order: fetch.order.clone(),
    };
    // Sources sit beside their separated song folders, which the corpus
    // index ignores as plain files
    let target = AcquisitionTarget {
        download_dir: &settings.corpus_dir,
        corpus_root: &settings.corpus_dir,
        show_progress: settings.show_progress,
    };

    acquisition::acquire_corpus(&client, &separator, &pool, &query, &target)
}

/// Corpus entries with locatable stems
pub fn list_corpus(settings: &Settings) -> Result<Vec<CorpusEntry>> {
    if !settings.corpus_dir.is_dir() {
        return Err(StemsimError::CorpusNotFound(settings.corpus_dir.clone()));
    }
    let locator = StemSetLocator::new(settings.separator.model.clone());
    let corpus = CorpusIndex::new(&settings.corpus_dir, locator);
    Ok(corpus.entries().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Copies a prepared song root instead of running a model
    struct CannedSeparator {
        stems: Vec<&'static str>,
    }

    impl StemSeparator for CannedSeparator {
        fn separate(&self, input_path: &Path, output_root: &Path) -> Result<PathBuf> {
            let song = input_path.file_stem().unwrap().to_string_lossy().into_owned();
            let dir = output_root.join(&song).join("htdemucs").join(&song);
            fs::create_dir_all(&dir).unwrap();
            for stem in &self.stems {
                fs::write(dir.join(format!("{stem}.wav")), b"not audio").unwrap();
            }
            Ok(output_root.join(song))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    struct FailingSeparator;

    impl StemSeparator for FailingSeparator {
        fn separate(&self, input_path: &Path, _output_root: &Path) -> Result<PathBuf> {
            Err(StemsimError::SeparationFailed {
                path: input_path.to_path_buf(),
                diagnostics: "model missing".into(),
            })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn settings(root: &Path) -> Settings {
        Settings {
            corpus_dir: root.join("corpus"),
            work_dir: root.join("work"),
            worker_threads: 2,
            show_progress: false,
            ..Settings::default()
        }
    }

    fn pool() -> Arc<ThreadPool> {
        build_worker_pool(2).unwrap()
    }

    #[test]
    fn test_missing_corpus_is_request_error() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        let upload = dir.path().join("song.mp3");
        fs::write(&upload, b"ID3").unwrap();

        let err = compare_upload(
            &settings,
            &UploadSource::Audio(upload),
            &CannedSeparator { stems: vec!["vocals"] },
            pool(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, StemsimError::CorpusNotFound(_)));
    }

    #[test]
    fn test_missing_upload_is_file_not_found() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        fs::create_dir_all(&settings.corpus_dir).unwrap();

        let err = compare_upload(
            &settings,
            &UploadSource::Audio(dir.path().join("absent.mp3")),
            &CannedSeparator { stems: vec!["vocals"] },
            pool(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, StemsimError::FileNotFound(_)));
    }

    #[test]
    fn test_separation_failure_fails_request() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        fs::create_dir_all(&settings.corpus_dir).unwrap();
        let upload = dir.path().join("song.mp3");
        fs::write(&upload, b"ID3").unwrap();

        let err = compare_upload(
            &settings,
            &UploadSource::Audio(upload),
            &FailingSeparator,
            pool(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "SEPARATION_FAILED");
    }

    #[test]
    fn test_upload_without_stems_is_not_found() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        fs::create_dir_all(&settings.corpus_dir).unwrap();
        let upload = dir.path().join("song.mp3");
        fs::write(&upload, b"ID3").unwrap();

        let err = compare_upload(
            &settings,
            &UploadSource::Audio(upload),
            &CannedSeparator { stems: vec![] },
            pool(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, StemsimError::StemSetNotFound { .. }));
    }

    #[test]
    fn test_empty_corpus_gives_empty_report() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        fs::create_dir_all(&settings.corpus_dir).unwrap();
        let upload = dir.path().join("song.mp3");
        fs::write(&upload, b"ID3").unwrap();

        let outcome = compare_upload(
            &settings,
            &UploadSource::Audio(upload),
            &CannedSeparator { stems: vec!["vocals"] },
            pool(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(outcome.report.is_empty());
        assert_eq!(outcome.song_root, settings.work_dir.join("song"));
    }

    #[test]
    fn test_interrupted_request_is_cancelled() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        fs::create_dir_all(&settings.corpus_dir).unwrap();
        let upload = dir.path().join("song.mp3");
        fs::write(&upload, b"ID3").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = compare_upload(
            &settings,
            &UploadSource::Audio(upload),
            &CannedSeparator { stems: vec!["vocals"] },
            pool(),
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, StemsimError::Cancelled));
        assert_eq!(err.code(), "CANCELLED");
    }

    #[test]
    fn test_list_corpus_requires_directory() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        assert!(matches!(
            list_corpus(&settings),
            Err(StemsimError::CorpusNotFound(_))
        ));
        fs::create_dir_all(&settings.corpus_dir).unwrap();
        assert!(list_corpus(&settings).unwrap().is_empty());
    }

    #[test]
    fn test_upload_source_prefers_stems_dir() {
        let args = CompareArgs {
            file: None,
            stems_dir: Some(PathBuf::from("out/song")),
            output: None,
        };
        let source = UploadSource::from_args(&args).unwrap();
        assert!(matches!(source, UploadSource::StemsDir(_)));
        assert_eq!(source.path(), Path::new("out/song"));
    }
}
