//! End-to-end tests of the watch/tag pipeline with a mock dispatcher.

use ifs_console::config::{MechanismConfig, Settings};
use ifs_console::dispatch::MockDispatcher;
use ifs_console::engine::SyncEngine;
use ifs_console::fits::FitsFile;
use ifs_console::mechanism::Selection;
use ifs_console::state::SessionInfo;
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn test_settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.watch.directory = dir.path().to_path_buf();
    settings.watch.pattern = "*.fits".to_string();
    settings.session.target = "M31".to_string();
    settings.session.observer = "jdoe".to_string();
    settings.mechanism = vec![MechanismConfig {
        name: "Filter".to_string(),
        axis: 0,
        keyword: "FILTER".to_string(),
        positions: BTreeMap::from([("Y".to_string(), 800), ("J".to_string(), 400)]),
        continuous: false,
    }];
    settings
}

#[test]
fn move_then_tick_stamps_new_frames() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Arc::new(MockDispatcher::new());
    let mut engine = SyncEngine::new(&test_settings(&dir), dispatcher.clone()).unwrap();

    engine
        .move_mechanism("Filter", &Selection::Label("J".to_string()))
        .unwrap();
    assert_eq!(
        engine.state().mechanisms()[0].current().to_string(),
        "J"
    );
    assert_eq!(dispatcher.calls(), vec!["gpMcdMove.csh 0 400"]);

    let frame = dir.path().join("frame0001.fits");
    FitsFile::new().save(&frame).unwrap();
    engine.tick();

    let fits = FitsFile::open(&frame).unwrap();
    assert_eq!(fits.value_of("FILTER").as_deref(), Some("J"));
    assert_eq!(fits.value_of("TARGET").as_deref(), Some("M31"));
    assert_eq!(fits.value_of("OBSERVER").as_deref(), Some("jdoe"));
    assert!(fits.contains_key("HISTORY"));
}

#[test]
fn second_tick_leaves_tagged_frames_untouched() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Arc::new(MockDispatcher::new());
    let mut engine = SyncEngine::new(&test_settings(&dir), dispatcher).unwrap();

    let frame = dir.path().join("frame0001.fits");
    FitsFile::new().save(&frame).unwrap();
    engine.tick();
    let after_first = fs::read(&frame).unwrap();

    engine.tick();
    assert_eq!(fs::read(&frame).unwrap(), after_first);
}

#[test]
fn session_update_applies_to_later_frames_only() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Arc::new(MockDispatcher::new());
    let mut engine = SyncEngine::new(&test_settings(&dir), dispatcher).unwrap();

    let first = dir.path().join("a.fits");
    FitsFile::new().save(&first).unwrap();
    engine.tick();

    engine.set_session(SessionInfo {
        target: "M42".to_string(),
        comments: "clouds rolling in".to_string(),
        observer: "jdoe".to_string(),
    });

    let second = dir.path().join("b.fits");
    FitsFile::new().save(&second).unwrap();
    engine.tick();

    let first_fits = FitsFile::open(&first).unwrap();
    let second_fits = FitsFile::open(&second).unwrap();
    assert_eq!(first_fits.value_of("TARGET").as_deref(), Some("M31"));
    assert_eq!(second_fits.value_of("TARGET").as_deref(), Some("M42"));
    assert_eq!(
        second_fits.value_of("COMMENTS").as_deref(),
        Some("clouds rolling in")
    );
}

#[test]
fn unmoved_mechanism_is_stamped_with_the_unknown_sentinel() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Arc::new(MockDispatcher::new());
    let mut engine = SyncEngine::new(&test_settings(&dir), dispatcher).unwrap();

    let frame = dir.path().join("frame.fits");
    FitsFile::new().save(&frame).unwrap();
    engine.tick();

    let fits = FitsFile::open(&frame).unwrap();
    assert_eq!(fits.value_of("FILTER").as_deref(), Some("-Unknown-"));
}

#[test]
fn rejected_move_is_not_visible_in_tags() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Arc::new(MockDispatcher::with_script(vec![Ok(0), Ok(1)]));
    let mut engine = SyncEngine::new(&test_settings(&dir), dispatcher).unwrap();

    engine
        .move_mechanism("Filter", &Selection::Label("Y".to_string()))
        .unwrap();
    // Control program rejects the second move; Y must stick.
    engine
        .move_mechanism("Filter", &Selection::Label("J".to_string()))
        .unwrap_err();

    let frame = dir.path().join("frame.fits");
    FitsFile::new().save(&frame).unwrap();
    engine.tick();

    let fits = FitsFile::open(&frame).unwrap();
    assert_eq!(fits.value_of("FILTER").as_deref(), Some("Y"));
}
