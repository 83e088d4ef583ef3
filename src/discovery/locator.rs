//! Stem set discovery
//!
//! The separation tool writes `<root>/<model>/<song>/<stem>.<ext>`. The
//! locator resolves `<root>` to the single song folder and indexes its stem
//! files by label (file name minus extension).

use crate::error::{Result, StemsimError};
use crate::types::{AudioAsset, AudioFormat, StemSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Default wrapping folder written by the separation tool
pub const DEFAULT_WRAPPER: &str = "htdemucs";

/// Finds the stem set beneath a separation output root
#[derive(Debug, Clone)]
pub struct StemSetLocator {
    wrapper: String,
}

impl StemSetLocator {
    /// `wrapper` is the folder name the tool nests its output in
    /// (for demucs, the model name)
    pub fn new(wrapper: impl Into<String>) -> Self {
        Self {
            wrapper: wrapper.into(),
        }
    }

    /// Path of the wrapping folder beneath `root`
    pub fn wrapper_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.wrapper)
    }

    /// Locate the stem set under `root`
    ///
    /// Requires exactly one song folder beneath the wrapper; more than one
    /// fails with `AmbiguousStemSet` rather than picking by listing order.
    pub fn locate(&self, root: &Path) -> Result<StemSet> {
        let wrapper_dir = self.wrapper_dir(root);
        if !wrapper_dir.is_dir() {
            return Err(StemsimError::stems_not_found(
                root,
                format!("no '{}' folder", self.wrapper),
            ));
        }

        let song_dirs = immediate_children(&wrapper_dir)
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .collect::<Vec<_>>();

        let song_dir = match song_dirs.as_slice() {
            [] => {
                return Err(StemsimError::stems_not_found(
                    root,
                    format!("'{}' contains no song folder", self.wrapper),
                ))
            }
            [single] => single.clone(),
            many => {
                return Err(StemsimError::AmbiguousStemSet {
                    path: wrapper_dir,
                    candidates: many.iter().map(|p| file_name(p)).collect(),
                })
            }
        };

        let stems = read_stem_files(&song_dir)?;
        if stems.is_empty() {
            return Err(StemsimError::stems_not_found(
                root,
                format!("'{}' contains no audio stems", song_dir.display()),
            ));
        }

        debug!(
            "Located {} stems in {}: {}",
            stems.len(),
            song_dir.display(),
            stems.labels().collect::<Vec<_>>().join(", ")
        );

        Ok(stems)
    }
}

impl Default for StemSetLocator {
    fn default() -> Self {
        Self::new(DEFAULT_WRAPPER)
    }
}

/// Index the audio files directly inside `song_dir` by label
fn read_stem_files(song_dir: &Path) -> Result<StemSet> {
    let mut set = StemSet::new(file_name(song_dir), song_dir);

    for entry in immediate_children(song_dir) {
        let path = entry.path();
        if !entry.file_type().is_file() || !AudioFormat::is_supported_path(path) {
            continue;
        }
        let Some(label) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!("Skipping stem with non UTF-8 name: {}", path.display());
            continue;
        };

        if let Some(existing) = set.insert(label, AudioAsset::new(path)) {
            return Err(StemsimError::AmbiguousStemSet {
                path: song_dir.to_path_buf(),
                candidates: vec![file_name(existing.path()), file_name(path)],
            });
        }
    }

    Ok(set)
}

/// Sorted immediate children of `dir`; unreadable entries are logged and skipped
///
/// Symlinks are followed, so `file_type()` reports the target's type.
pub(crate) fn immediate_children(dir: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Cannot read directory entry: {}", e);
                None
            }
        })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
