//! Unified error types for stemsim
//!
//! Error strategy:
//! - Unit-local errors (one stem, one corpus entry, one track): recoverable,
//!   logged and skipped
//! - Request-level errors (separation, the upload's own stem set): surfaced
//!   to the caller with a taxonomy code
//!
//! All errors include actionable suggestions where possible.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for stemsim operations
#[derive(Debug, Error)]
pub enum StemsimError {
    // =========================================================================
    // Stem set discovery
    // =========================================================================
    #[error("No stem set found under '{path}': {reason}\n  Tip: Check that the separation tool finished and wrote its output folder")]
    StemSetNotFound { path: PathBuf, reason: String },

    #[error("Ambiguous stem set under '{path}': found {}\n  Tip: Remove stale separation output so exactly one song folder remains", candidates.join(", "))]
    AmbiguousStemSet {
        path: PathBuf,
        candidates: Vec<String>,
    },

    // =========================================================================
    // Unit-local errors - skip the stem / entry / track, continue
    // =========================================================================
    #[error("Failed to read audio '{path}': {reason}\n  Tip: If the file plays in other apps, it may use an unsupported codec")]
    UnreadableAudio { path: PathBuf, reason: String },

    #[error("Feature vector for '{path}' has zero norm; similarity is undefined")]
    DegenerateVector { path: PathBuf },

    #[error("Failed to download track '{track}': {reason}")]
    DownloadFailed { track: String, reason: String },

    // =========================================================================
    // Request-level errors - abort the upload
    // =========================================================================
    #[error("Stem separation failed for '{path}':\n{diagnostics}\n  Tip: Run the separator by hand on this file to see the full output")]
    SeparationFailed { path: PathBuf, diagnostics: String },

    #[error("Stem separation for '{path}' exceeded {}s and was stopped\n  Tip: Raise --separation-timeout for long tracks", timeout.as_secs())]
    SeparationTimeout { path: PathBuf, timeout: Duration },

    #[error("Corpus directory not found: '{0}'\n  Tip: Populate it first with `stemsim fetch --genre <TAG>`")]
    CorpusNotFound(PathBuf),

    #[error("File not found: '{0}'\n  Tip: Check the path exists and is accessible")]
    FileNotFound(PathBuf),

    #[error("Comparison was cancelled")]
    Cancelled,

    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    OutputError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for stemsim operations
pub type Result<T> = std::result::Result<T, StemsimError>;

impl StemsimError {
    /// Returns true if this error is local to one unit of work
    /// (skip it, keep the rest of the comparison or batch going)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StemsimError::UnreadableAudio { .. }
                | StemsimError::DegenerateVector { .. }
                | StemsimError::DownloadFailed { .. }
                | StemsimError::StemSetNotFound { .. }
                | StemsimError::AmbiguousStemSet { .. }
        )
    }

    /// Stable taxonomy code reported to callers on request-level failure
    pub fn code(&self) -> &'static str {
        match self {
            StemsimError::StemSetNotFound { .. } => "STEM_SET_NOT_FOUND",
            StemsimError::AmbiguousStemSet { .. } => "AMBIGUOUS_STEM_SET",
            StemsimError::UnreadableAudio { .. } => "UNREADABLE_AUDIO",
            StemsimError::DegenerateVector { .. } => "DEGENERATE_VECTOR",
            StemsimError::DownloadFailed { .. } => "DOWNLOAD_FAILED",
            StemsimError::SeparationFailed { .. } => "SEPARATION_FAILED",
            StemsimError::SeparationTimeout { .. } => "SEPARATION_TIMEOUT",
            StemsimError::CorpusNotFound(_) => "CORPUS_NOT_FOUND",
            StemsimError::FileNotFound(_) => "FILE_NOT_FOUND",
            StemsimError::Cancelled => "CANCELLED",
            StemsimError::OutputError { .. } => "OUTPUT_ERROR",
            StemsimError::ConfigError(_) => "CONFIG_ERROR",
            StemsimError::Io(_) => "IO_ERROR",
        }
    }

    /// Create an unreadable-audio error with context about the issue
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StemsimError::UnreadableAudio {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a stem-set-not-found error
    pub fn stems_not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StemsimError::StemSetNotFound {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                format!("Directory does not exist: {}", path.parent().map(|p| p.display().to_string()).unwrap_or_default())
            }
            _ => err.to_string(),
        };
        StemsimError::OutputError { path, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_local_errors_are_recoverable() {
        assert!(StemsimError::unreadable("a.wav", "bad header").is_recoverable());
        assert!(StemsimError::DegenerateVector { path: "a.wav".into() }.is_recoverable());
        assert!(StemsimError::DownloadFailed {
            track: "42".into(),
            reason: "404".into()
        }
        .is_recoverable());
    }

    #[test]
    fn test_request_level_errors_are_fatal() {
        let failed = StemsimError::SeparationFailed {
            path: "song.mp3".into(),
            diagnostics: "boom".into(),
        };
        let timeout = StemsimError::SeparationTimeout {
            path: "song.mp3".into(),
            timeout: Duration::from_secs(5),
        };
        assert!(!failed.is_recoverable());
        assert!(!timeout.is_recoverable());
        assert_eq!(failed.code(), "SEPARATION_FAILED");
        assert_eq!(timeout.code(), "SEPARATION_TIMEOUT");
    }

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = StemsimError::AmbiguousStemSet {
            path: "out/htdemucs".into(),
            candidates: vec!["song_a".into(), "song_b".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("song_a, song_b"));
        assert_eq!(err.code(), "AMBIGUOUS_STEM_SET");
    }
}
