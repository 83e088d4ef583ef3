//! Reference corpus enumeration
//!
//! Each immediate subdirectory of the corpus root is one reference song,
//! itself a separation output root. Entries are produced lazily; songs whose
//! stems cannot be located are logged and skipped.

use super::locator::{immediate_children, StemSetLocator};
use crate::types::StemSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One located reference song
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    /// Corpus folder name
    pub song_id: String,
    pub stems: StemSet,
}

/// Read-only view over a corpus directory
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    root: PathBuf,
    locator: StemSetLocator,
}

impl CorpusIndex {
    pub fn new(root: impl Into<PathBuf>, locator: StemSetLocator) -> Self {
        Self {
            root: root.into(),
            locator,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily enumerate located entries
    ///
    /// Each call re-reads the filesystem, so a second pass reflects any
    /// corpus changes made in between.
    pub fn entries(&self) -> CorpusEntries<'_> {
        if !self.root.is_dir() {
            warn!("Corpus directory {} is not readable", self.root.display());
        }
        CorpusEntries {
            children: Box::new(immediate_children(&self.root)),
            locator: &self.locator,
        }
    }
}

/// Iterator returned by [`CorpusIndex::entries`]
pub struct CorpusEntries<'a> {
    children: Box<dyn Iterator<Item = walkdir::DirEntry> + Send + 'a>,
    locator: &'a StemSetLocator,
}

impl Iterator for CorpusEntries<'_> {
    type Item = CorpusEntry;

    fn next(&mut self) -> Option<CorpusEntry> {
        for child in self.children.by_ref() {
            // Downloaded source files sit next to their song folders
            if !child.file_type().is_dir() {
                debug!("Ignoring non-directory corpus entry {}", child.path().display());
                continue;
            }

            let song_id = child.file_name().to_string_lossy().into_owned();
            match self.locator.locate(child.path()) {
                Ok(stems) => {
                    debug!("Corpus entry {}: {} stems", song_id, stems.len());
                    return Some(CorpusEntry { song_id, stems });
                }
                Err(e) => {
                    warn!("Skipping corpus entry {}: {}", song_id, e);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn song(corpus: &Path, id: &str, stems: &[&str]) {
        let dir = corpus.join(id).join("htdemucs").join(id);
        fs::create_dir_all(&dir).unwrap();
        for stem in stems {
            fs::write(dir.join(format!("{stem}.wav")), b"RIFF").unwrap();
        }
    }

    #[test]
    fn test_enumerates_located_songs_in_name_order() {
        let corpus = TempDir::new().unwrap();
        song(corpus.path(), "2_beta", &["vocals"]);
        song(corpus.path(), "1_alpha", &["vocals", "drums"]);
        fs::write(corpus.path().join("1_alpha.mp3"), b"ID3").unwrap();

        let index = CorpusIndex::new(corpus.path(), StemSetLocator::default());
        let ids: Vec<_> = index.entries().map(|e| e.song_id).collect();
        assert_eq!(ids, vec!["1_alpha", "2_beta"]);
    }

    #[test]
    fn test_malformed_entry_is_skipped() {
        let corpus = TempDir::new().unwrap();
        song(corpus.path(), "good", &["bass"]);
        fs::create_dir_all(corpus.path().join("unprocessed")).unwrap();

        let index = CorpusIndex::new(corpus.path(), StemSetLocator::default());
        let entries: Vec<_> = index.entries().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].song_id, "good");
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let corpus = TempDir::new().unwrap();
        let index = CorpusIndex::new(corpus.path().join("absent"), StemSetLocator::default());
        assert_eq!(index.entries().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_song_folder_is_enumerated() {
        let corpus = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        song(elsewhere.path(), "s1", &["vocals"]);
        std::os::unix::fs::symlink(elsewhere.path().join("s1"), corpus.path().join("s1")).unwrap();

        let index = CorpusIndex::new(corpus.path(), StemSetLocator::default());
        let entries: Vec<_> = index.entries().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].song_id, "s1");
        assert!(entries[0].stems.get("vocals").is_some());
    }

    #[test]
    fn test_entries_are_restartable() {
        let corpus = TempDir::new().unwrap();
        song(corpus.path(), "a", &["vocals"]);
        let index = CorpusIndex::new(corpus.path(), StemSetLocator::default());
        assert_eq!(index.entries().count(), 1);

        song(corpus.path(), "b", &["vocals"]);
        assert_eq!(index.entries().count(), 2);
    }
}
