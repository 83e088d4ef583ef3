//! Source separation boundary
//!
//! The separator itself is an external tool; this module only launches it
//! and hands back the directory its output landed in.

pub mod demucs;
pub mod traits;

pub use demucs::DemucsSeparator;
pub use traits::StemSeparator;
