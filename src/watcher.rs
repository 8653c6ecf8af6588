//! Polling directory watcher for newly written data files.
//!
//! The watcher diffs successive directory listings against a baseline
//! captured at initialization, so files already on disk when the console
//! starts are never reported, and each new appearance is reported at most
//! once. It does no sleeping or threading of its own; the sync engine
//! calls [`DataFileWatcher::poll`] on its tick cadence.

use crate::error::ConsoleError;
use glob::Pattern;
use log::info;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

/// Watches one directory for new files matching a filename glob.
#[derive(Debug)]
pub struct DataFileWatcher {
    dir: PathBuf,
    pattern: Pattern,
    known: BTreeSet<String>,
}

impl DataFileWatcher {
    /// Captures the current listing as the baseline and starts watching.
    pub fn initialize(dir: &Path, pattern: &str) -> Result<Self, ConsoleError> {
        let compiled = Pattern::new(pattern).map_err(|source| ConsoleError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let mut watcher = Self {
            dir: dir.to_path_buf(),
            pattern: compiled,
            known: BTreeSet::new(),
        };
        watcher.known = watcher.list_matching()?;
        info!(
            "Now watching directory {} for new {} files.",
            watcher.dir.display(),
            pattern
        );
        if !watcher.known.is_empty() {
            info!(
                "Ignoring already present files: {}",
                watcher.known.iter().cloned().collect::<Vec<_>>().join(" ")
            );
        }
        Ok(watcher)
    }

    /// The directory being watched.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the filenames that appeared since the last poll, sorted.
    ///
    /// A name that vanished and reappeared counts as a new appearance.
    pub fn poll(&mut self) -> io::Result<Vec<String>> {
        let current = self.list_matching()?;
        let new: Vec<String> = current.difference(&self.known).cloned().collect();
        self.known = current;
        Ok(new)
    }

    fn list_matching(&self) -> io::Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.pattern.matches(&name) {
                names.insert(name);
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        fs::write(dir.path().join(name), b"x").unwrap();
    }

    #[test]
    fn baseline_files_are_never_reported() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.fits");
        touch(&dir, "b.fits");

        let mut watcher = DataFileWatcher::initialize(dir.path(), "*.fits").unwrap();
        assert_eq!(watcher.poll().unwrap(), Vec::<String>::new());
    }

    #[test]
    fn new_file_reported_exactly_once() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.fits");
        touch(&dir, "b.fits");
        let mut watcher = DataFileWatcher::initialize(dir.path(), "*.fits").unwrap();

        touch(&dir, "c.fits");
        assert_eq!(watcher.poll().unwrap(), vec!["c.fits".to_string()]);
        assert_eq!(watcher.poll().unwrap(), Vec::<String>::new());
        assert_eq!(watcher.poll().unwrap(), Vec::<String>::new());
    }

    #[test]
    fn unchanged_directory_polls_empty() {
        let dir = TempDir::new().unwrap();
        let mut watcher = DataFileWatcher::initialize(dir.path(), "*.fits").unwrap();
        assert_eq!(watcher.poll().unwrap(), Vec::<String>::new());
        assert_eq!(watcher.poll().unwrap(), Vec::<String>::new());
    }

    #[test]
    fn pattern_filters_unrelated_files() {
        let dir = TempDir::new().unwrap();
        let mut watcher = DataFileWatcher::initialize(dir.path(), "*.fits").unwrap();

        touch(&dir, "notes.txt");
        touch(&dir, "frame.fits");
        assert_eq!(watcher.poll().unwrap(), vec!["frame.fits".to_string()]);
    }

    #[test]
    fn reappearance_counts_as_new() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "a.fits");
        let mut watcher = DataFileWatcher::initialize(dir.path(), "*.fits").unwrap();

        fs::remove_file(dir.path().join("a.fits")).unwrap();
        assert_eq!(watcher.poll().unwrap(), Vec::<String>::new());

        touch(&dir, "a.fits");
        assert_eq!(watcher.poll().unwrap(), vec!["a.fits".to_string()]);
    }

    #[test]
    fn bad_pattern_is_a_configuration_error() {
        let dir = TempDir::new().unwrap();
        let err = DataFileWatcher::initialize(dir.path(), "[").unwrap_err();
        assert!(matches!(err, ConsoleError::Pattern { .. }));
    }
}
