//! Stamps newly produced data files with the instrument state.
//!
//! Idempotence is decided by the file itself: the tagger looks for the
//! marker keyword in the target file's header and leaves the file alone
//! if it is already there. Keeping that check in the file rather than in
//! memory makes double-tagging impossible across process restarts and
//! concurrent pollers. Do not replace it with in-memory tracking.

use crate::error::TagError;
use crate::fits::{FitsError, FitsFile};
use crate::state::InstrumentSnapshot;
use log::{debug, info};
use std::path::Path;

/// Header keyword whose presence means "this file was already tagged".
pub const MARKER_KEYWORD: &str = "TARGET";

/// Outcome of a tagging attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    /// The header was stamped and the file rewritten.
    Tagged,
    /// The marker keyword was already present; the file was not touched.
    AlreadyTagged,
}

/// Writes the instrument snapshot into data file headers, exactly once.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataTagger;

impl MetadataTagger {
    pub fn new() -> Self {
        Self
    }

    /// Tags one file with the given snapshot.
    ///
    /// Appends one HISTORY line, the session fields, and one card per
    /// mechanism, then persists the file in place. Returns
    /// [`TagOutcome::AlreadyTagged`] without modification when the marker
    /// keyword is present.
    pub fn tag(&self, path: &Path, snapshot: &InstrumentSnapshot) -> Result<TagOutcome, TagError> {
        let mut fits = FitsFile::open(path).map_err(|e| into_tag_error(path, e))?;
        if fits.contains_key(MARKER_KEYWORD) {
            debug!("{} already tagged, skipping", path.display());
            return Ok(TagOutcome::AlreadyTagged);
        }

        fits.append_history(" Header keywords updated by ifs-console");
        fits.append_string("TARGET", &snapshot.target, None);
        fits.append_string("COMMENTS", &snapshot.comments, None);
        fits.append_string("OBSERVER", &snapshot.observer, None);
        for (keyword, value) in &snapshot.mechanisms {
            fits.append_string(keyword, value, None);
        }
        fits.save(path).map_err(|source| TagError::IoFailure {
            path: path.display().to_string(),
            source,
        })?;
        info!("Updated FITS keywords in {}", path.display());
        Ok(TagOutcome::Tagged)
    }
}

fn into_tag_error(path: &Path, err: FitsError) -> TagError {
    let path = path.display().to_string();
    match err {
        FitsError::Io(source) => TagError::IoFailure { path, source },
        FitsError::Malformed(reason) => TagError::BadHeader { path, reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::FitsFile;
    use crate::state::InstrumentSnapshot;
    use std::fs;
    use tempfile::TempDir;

    fn snapshot() -> InstrumentSnapshot {
        InstrumentSnapshot {
            target: "M31".to_string(),
            comments: String::new(),
            observer: "jdoe".to_string(),
            mechanisms: vec![("FILTER".to_string(), "J".to_string())],
        }
    }

    fn fresh_file(dir: &TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        FitsFile::new().save(&path).unwrap();
        path
    }

    #[test]
    fn fresh_file_gets_all_cards_and_history() {
        let dir = TempDir::new().unwrap();
        let path = fresh_file(&dir, "frame.fits");
        let tagger = MetadataTagger::new();

        assert_eq!(tagger.tag(&path, &snapshot()).unwrap(), TagOutcome::Tagged);

        let fits = FitsFile::open(&path).unwrap();
        assert_eq!(fits.value_of("TARGET").as_deref(), Some("M31"));
        assert_eq!(fits.value_of("OBSERVER").as_deref(), Some("jdoe"));
        assert_eq!(fits.value_of("COMMENTS").as_deref(), Some(""));
        assert_eq!(fits.value_of("FILTER").as_deref(), Some("J"));
        assert!(fits.contains_key("HISTORY"));
    }

    #[test]
    fn second_tag_is_a_no_op_with_identical_bytes() {
        let dir = TempDir::new().unwrap();
        let path = fresh_file(&dir, "frame.fits");
        let tagger = MetadataTagger::new();

        tagger.tag(&path, &snapshot()).unwrap();
        let before = fs::read(&path).unwrap();

        let mut second = snapshot();
        second.target = "M42".to_string();
        assert_eq!(
            tagger.tag(&path, &second).unwrap(),
            TagOutcome::AlreadyTagged
        );
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn marker_key_alone_suppresses_tagging() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.fits");
        let mut fits = FitsFile::new();
        fits.append_string(MARKER_KEYWORD, "elsewhere", None);
        fits.save(&path).unwrap();
        let before = fs::read(&path).unwrap();

        let outcome = MetadataTagger::new().tag(&path, &snapshot()).unwrap();
        assert_eq!(outcome, TagOutcome::AlreadyTagged);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn unreadable_file_is_a_bad_header_not_a_panic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.fits");
        fs::write(&path, b"this is not a FITS file").unwrap();

        let err = MetadataTagger::new().tag(&path, &snapshot()).unwrap_err();
        assert!(matches!(err, TagError::BadHeader { .. }));
    }

    #[test]
    fn missing_file_is_an_io_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.fits");

        let err = MetadataTagger::new().tag(&path, &snapshot()).unwrap_err();
        assert!(matches!(err, TagError::IoFailure { .. }));
    }
}
