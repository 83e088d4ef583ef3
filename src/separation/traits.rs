//! Separation backend abstraction

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Source separation backend
pub trait StemSeparator: Send + Sync {
    /// Separate `input_path` into stems beneath `output_root`
    ///
    /// # Returns
    /// The song root the stems were written under, i.e. the directory a
    /// `StemSetLocator` should be pointed at
    fn separate(&self, input_path: &Path, output_root: &Path) -> Result<PathBuf>;

    /// True if stems for `input_path` already exist beneath `output_root`
    fn is_separated(&self, _input_path: &Path, _output_root: &Path) -> bool {
        false
    }

    /// Get the name of this separator (for logging)
    fn name(&self) -> &str;
}
