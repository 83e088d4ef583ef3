//! Request orchestration

pub mod orchestrator;

pub use orchestrator::{
    build_separator, build_worker_pool, compare_upload, export_report, list_corpus, run_fetch,
    CompareOutcome, UploadSource,
};
