//! Report export

pub mod json;

pub use json::{normalize_score, to_json_string, write_report};
