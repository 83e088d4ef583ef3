//! Runtime configuration settings

use super::cli::{Cli, FetchArgs};
use crate::discovery::DEFAULT_WRAPPER;
use crate::features::mfcc::DEFAULT_N_MFCC;
use std::path::PathBuf;
use std::time::Duration;

/// How uploads and corpus songs are separated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeparatorSettings {
    /// Program followed by any launcher arguments
    pub command: Vec<String>,
    /// Model name, also the wrapper folder stem sets are found under
    pub model: String,
    /// `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for SeparatorSettings {
    fn default() -> Self {
        Self {
            command: vec!["demucs".to_string()],
            model: DEFAULT_WRAPPER.to_string(),
            timeout: Some(Duration::from_secs(1800)),
        }
    }
}

/// Runtime settings shared by every command
#[derive(Debug, Clone)]
pub struct Settings {
    /// Reference corpus root
    pub corpus_dir: PathBuf,
    /// Where uploads are separated to
    pub work_dir: PathBuf,
    /// Size of the worker pool
    pub worker_threads: usize,
    pub separator: SeparatorSettings,
    /// MFCC coefficients per vector
    pub n_mfcc: usize,
    /// Show progress bars
    pub show_progress: bool,
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_cli(cli: &Cli) -> Self {
        let timeout = match cli.separation_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            corpus_dir: cli.corpus.clone(),
            work_dir: cli.work_dir.clone(),
            worker_threads: cli.threads.unwrap_or_else(default_threads).max(1),
            separator: SeparatorSettings {
                command: cli.separator_cmd.split_whitespace().map(String::from).collect(),
                model: cli.model.clone(),
                timeout,
            },
            n_mfcc: usize::from(cli.n_mfcc),
            show_progress: !cli.quiet,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("./downloaded_songs"),
            work_dir: PathBuf::from("./uploads/Stemmed_Uploads"),
            worker_threads: default_threads(),
            separator: SeparatorSettings::default(),
            n_mfcc: DEFAULT_N_MFCC,
            show_progress: true,
        }
    }
}

/// Settings for the `fetch` command
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub genre: String,
    pub limit: usize,
    pub client_id: String,
    pub api_base: String,
    pub order: String,
    /// Minimum spacing between API requests
    pub request_interval: Duration,
}

impl FetchSettings {
    pub fn from_args(args: &FetchArgs) -> Self {
        Self {
            genre: args.genre.clone(),
            limit: args.limit,
            client_id: args.client_id.clone(),
            api_base: args.api_base.clone(),
            order: args.order.clone(),
            request_interval: Duration::from_millis(args.request_interval_ms),
        }
    }
}

/// One worker per core, leaving one for the main thread
fn default_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_cli_splits_separator_command() {
        let cli = Cli::try_parse_from([
            "stemsim",
            "--separator-cmd",
            "python3 -m demucs",
            "--separation-timeout",
            "0",
            "-j",
            "0",
            "corpus",
        ])
        .unwrap();
        let settings = Settings::from_cli(&cli);
        assert_eq!(settings.separator.command, vec!["python3", "-m", "demucs"]);
        assert_eq!(settings.separator.timeout, None);
        assert_eq!(settings.worker_threads, 1);
        assert_eq!(settings.n_mfcc, 13);
    }

    #[test]
    fn test_defaults_match_cli_defaults() {
        let cli = Cli::try_parse_from(["stemsim", "corpus"]).unwrap();
        let from_cli = Settings::from_cli(&cli);
        let default = Settings::default();
        assert_eq!(from_cli.corpus_dir, default.corpus_dir);
        assert_eq!(from_cli.work_dir, default.work_dir);
        assert_eq!(from_cli.separator, default.separator);
        assert_eq!(from_cli.worker_threads, default.worker_threads);
        assert!(default.worker_threads >= 1);
    }
}
