//! JSON similarity report

use crate::error::{Result, StemsimError};
use crate::types::{SimilarityRecord, SimilarityReport};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{info, warn};

/// JSON output schema version
const SCHEMA_VERSION: &str = "1.0";

/// Top-level JSON output structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportJson {
    /// Schema version for forward compatibility
    pub version: String,
    pub metadata: ReportMetadata,
    /// Human-readable summary line
    pub message: String,
    pub similarity_results: Vec<RecordJson>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// stemsim version that generated this file
    pub generator_version: String,
    pub generated_at: String,
    /// Uploaded file or song root the report is about
    pub upload: String,
    pub corpus: String,
    pub record_count: usize,
    pub compared_pairs: usize,
    pub skipped_pairs: usize,
    pub failed_pairs: usize,
    /// Uploaded stems whose features could not be extracted
    #[serde(default)]
    pub unreadable_uploads: usize,
}

/// One uploaded-stem / reference-stem pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordJson {
    /// Stem label
    pub stem: String,
    pub uploaded_stem: String,
    pub reference_song: String,
    pub downloaded_stem: String,
    pub similarity: f64,
}

/// Clamp a score to [-1, 1], rejecting NaN and infinities
pub fn normalize_score(score: f64) -> Option<f64> {
    score.is_finite().then(|| score.clamp(-1.0, 1.0))
}

fn record_to_json(record: &SimilarityRecord) -> Option<RecordJson> {
    let Some(similarity) = normalize_score(record.score) else {
        warn!(
            "Dropping non-finite score for {} vs {}",
            record.uploaded.path().display(),
            record.reference.path().display()
        );
        return None;
    };

    Some(RecordJson {
        stem: record.label.clone(),
        uploaded_stem: record.uploaded.path().to_string_lossy().to_string(),
        reference_song: record.reference_song.clone(),
        downloaded_stem: record.reference.path().to_string_lossy().to_string(),
        similarity,
    })
}

/// Build the JSON document for `report`
pub fn report_to_json(report: &SimilarityReport, upload: &Path, corpus: &Path) -> ReportJson {
    let similarity_results: Vec<RecordJson> =
        report.records.iter().filter_map(record_to_json).collect();

    let unreadable = report.stats.unreadable_uploads;
    let message = match (similarity_results.len(), unreadable) {
        (0, 0) => "No matching stems found in the corpus".to_string(),
        (0, n) => format!("No uploaded stems could be analyzed ({} unreadable)", n),
        (records, 0) => format!("Compared {} stem pairs", records),
        (records, n) => format!(
            "Compared {} stem pairs; {} uploaded stems could not be analyzed",
            records, n
        ),
    };

    ReportJson {
        version: SCHEMA_VERSION.to_string(),
        metadata: ReportMetadata {
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            upload: upload.to_string_lossy().to_string(),
            corpus: corpus.to_string_lossy().to_string(),
            record_count: similarity_results.len(),
            compared_pairs: report.stats.compared_pairs,
            skipped_pairs: report.stats.skipped_pairs,
            failed_pairs: report.stats.failed_pairs,
            unreadable_uploads: unreadable,
        },
        message,
        similarity_results,
    }
}

/// Serialize `report` as pretty-printed JSON
pub fn to_json_string(report: &SimilarityReport, upload: &Path, corpus: &Path) -> Result<String> {
    serde_json::to_string_pretty(&report_to_json(report, upload, corpus))
        .map_err(|e| StemsimError::ConfigError(format!("Failed to serialize report: {}", e)))
}

/// Write `report` to a JSON file
///
/// Uses atomic write pattern: writes to a temp file first, then renames.
pub fn write_report(
    report: &SimilarityReport,
    upload: &Path,
    corpus: &Path,
    output_path: &Path,
) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StemsimError::output_error(parent, e))?;
    }

    // Same directory keeps the rename on one filesystem
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| StemsimError::OutputError {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;

    let document = report_to_json(report, upload, corpus);
    serde_json::to_writer_pretty(BufWriter::new(file), &document).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        StemsimError::OutputError {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        StemsimError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    info!(
        "Wrote {} similarity results to {}",
        document.metadata.record_count,
        output_path.display()
    );

    Ok(())
}
