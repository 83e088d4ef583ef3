//! CLI argument parsing and configuration

use crate::acquisition::jamendo::{DEFAULT_API_BASE, DEFAULT_ORDER};
use crate::discovery::DEFAULT_WRAPPER;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// stemsim - stem-wise audio similarity against a reference corpus
///
/// Separates an uploaded track into stems and scores each stem against the
/// matching stems of every song in a local corpus.
#[derive(Parser, Debug)]
#[command(name = "stemsim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Reference corpus directory (one separated song per subdirectory)
    #[arg(long, global = true, value_name = "DIR", default_value = "./downloaded_songs")]
    pub corpus: PathBuf,

    /// Directory that receives separated uploads
    #[arg(long, global = true, value_name = "DIR", default_value = "./uploads/Stemmed_Uploads")]
    pub work_dir: PathBuf,

    /// Number of worker threads (defaults to CPU count - 1)
    #[arg(short = 'j', long, global = true, value_name = "N")]
    pub threads: Option<usize>,

    /// Separator command line (e.g. "demucs" or "python3 -m demucs")
    #[arg(long, global = true, value_name = "CMD", default_value = "demucs")]
    pub separator_cmd: String,

    /// Separation model; also the folder the separator wraps its output in
    #[arg(long, global = true, value_name = "NAME", default_value = DEFAULT_WRAPPER)]
    pub model: String,

    /// Seconds before a separation is abandoned (0 disables the limit)
    #[arg(long, global = true, value_name = "SECS", default_value_t = 1800)]
    pub separation_timeout: u64,

    /// Number of MFCC coefficients per feature vector
    #[arg(long, global = true, value_name = "N", default_value_t = 13)]
    #[arg(value_parser = clap::value_parser!(u16).range(1..=128))]
    pub n_mfcc: u16,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only, no progress bars)
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compare an uploaded track against the corpus
    Compare(CompareArgs),
    /// Download tracks for a genre and separate them into the corpus
    Fetch(FetchArgs),
    /// List the corpus entries that have locatable stems
    Corpus,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Uploaded audio file
    #[arg(value_name = "FILE", required_unless_present = "stems_dir")]
    pub file: Option<PathBuf>,

    /// Use an already-separated song root instead of running the separator
    #[arg(long, value_name = "DIR", conflicts_with = "file")]
    pub stems_dir: Option<PathBuf>,

    /// Write the JSON report here instead of printing it
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Genre tag to search for
    #[arg(long, value_name = "TAG")]
    pub genre: String,

    /// Number of tracks to request
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub limit: usize,

    /// Jamendo API client id
    #[arg(long, env = "JAMENDO_CLIENT_ID", hide_env_values = true, value_name = "ID")]
    pub client_id: String,

    /// API base URL
    #[arg(long, value_name = "URL", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Result ordering
    #[arg(long, value_name = "ORDER", default_value = DEFAULT_ORDER)]
    pub order: String,

    /// Minimum delay between API requests
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pub request_interval_ms: u64,
}

impl Cli {
    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
