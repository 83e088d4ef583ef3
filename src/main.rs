//! stemsim CLI entry point

use clap::Parser;
use stemsim::config::{Cli, Command, CompareArgs, FetchSettings, Settings};
use stemsim::pipeline::{self, UploadSource};
use stemsim::similarity::CancellationToken;
use stemsim::StemsimError;
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli);

    let settings = Settings::from_cli(&cli);

    let result = match &cli.command {
        Command::Compare(args) => run_compare(&settings, args),
        Command::Fetch(args) => run_fetch(&settings, &FetchSettings::from_args(args)),
        Command::Corpus => run_corpus(&settings),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let filter = cli.log_level().to_string().to_lowercase();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_compare(settings: &Settings, args: &CompareArgs) -> Result<ExitCode, StemsimError> {
    let source = UploadSource::from_args(args)?;
    if let UploadSource::StemsDir(dir) = &source {
        if !dir.is_dir() {
            return Err(StemsimError::stems_not_found(
                dir,
                "the --stems-dir path is not a directory",
            ));
        }
    }

    let separator = pipeline::build_separator(settings)?;
    let pool = pipeline::build_worker_pool(settings.worker_threads)?;

    let cancel = CancellationToken::new();
    if let Err(e) = cancel.cancel_on_interrupt() {
        warn!("{}", e);
    }

    let outcome = pipeline::compare_upload(settings, &source, &separator, pool, &cancel)?;

    if let Some(json) = pipeline::export_report(&outcome, &source, settings, args.output.as_deref())? {
        println!("{}", json);
    }

    let stats = outcome.report.stats;
    eprintln!(
        "Summary: {} records ({} pairs compared, {} skipped, {} failed)",
        outcome.report.len(),
        stats.compared_pairs,
        stats.skipped_pairs,
        stats.failed_pairs
    );
    if stats.unreadable_uploads > 0 {
        eprintln!(
            "Warning: {} uploaded stems could not be analyzed",
            stats.unreadable_uploads
        );
    }

    Ok(ExitCode::SUCCESS)
}

fn run_fetch(settings: &Settings, fetch: &FetchSettings) -> Result<ExitCode, StemsimError> {
    let summary = pipeline::run_fetch(settings, fetch)?;

    println!();
    println!(
        "Summary: {} requested, {} downloaded, {} cached, {} separated, {} failed",
        summary.requested, summary.downloaded, summary.cached, summary.separated, summary.failed
    );

    if summary.failed > 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn run_corpus(settings: &Settings) -> Result<ExitCode, StemsimError> {
    let entries = pipeline::list_corpus(settings)?;

    for entry in &entries {
        println!(
            "{}  [{}]",
            entry.song_id,
            entry.stems.labels().collect::<Vec<_>>().join(", ")
        );
    }
    println!();
    println!(
        "{} songs with stems in {}",
        entries.len(),
        settings.corpus_dir.display()
    );

    Ok(ExitCode::SUCCESS)
}
