//! The sync engine: tick cadence, registry ownership, watch-and-tag loop.
//!
//! One engine owns the instrument state, the directory watcher, and the
//! tagger. Each tick polls for new data files and stamps every one with a
//! snapshot taken at the start of the tick. Moves and ticks run on the
//! same task, so a snapshot can never observe a half-applied move. No
//! failure inside a tick stops the loop: watcher I/O errors and per-file
//! tag errors are logged and the engine keeps going.

use crate::config::Settings;
use crate::dispatch::CommandDispatcher;
use crate::error::{ConsoleError, ConsoleResult, MoveError};
use crate::mechanism::{MechanismController, PositionValue, Selection};
use crate::state::{InstrumentState, SessionInfo};
use crate::tagger::{MetadataTagger, TagOutcome};
use crate::watcher::DataFileWatcher;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Orchestrates the mechanism registry and the watch/tag pipeline.
pub struct SyncEngine {
    state: InstrumentState,
    watcher: DataFileWatcher,
    tagger: MetadataTagger,
    dispatcher: Arc<dyn CommandDispatcher>,
    move_program: String,
    interval: Duration,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("state", &self.state)
            .field("watcher", &self.watcher)
            .field("tagger", &self.tagger)
            .field("move_program", &self.move_program)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Builds the engine from settings: constructs the registry and
    /// captures the watch baseline. Files already in the watched
    /// directory will never be tagged.
    pub fn new(settings: &Settings, dispatcher: Arc<dyn CommandDispatcher>) -> ConsoleResult<Self> {
        let state = InstrumentState::new(
            settings.mechanism_states(),
            settings.session.to_session(),
        );
        let watcher =
            DataFileWatcher::initialize(&settings.watch.directory, &settings.watch.pattern)?;
        let interval = Duration::try_from_secs_f64(settings.watch.poll_interval_secs)
            .map_err(|e| {
                ConsoleError::Configuration(format!(
                    "watch.poll_interval_secs {}: {e}",
                    settings.watch.poll_interval_secs
                ))
            })?;
        Ok(Self {
            state,
            watcher,
            tagger: MetadataTagger::new(),
            dispatcher,
            move_program: settings.console.move_program.clone(),
            interval,
        })
    }

    /// The live instrument state.
    pub fn state(&self) -> &InstrumentState {
        &self.state
    }

    /// Replaces the operator session fields used for future tags.
    pub fn set_session(&mut self, session: SessionInfo) {
        self.state.set_session(session);
    }

    /// Moves a mechanism by name; the registry updates only on success.
    pub fn move_mechanism(
        &mut self,
        name: &str,
        selection: &Selection,
    ) -> Result<PositionValue, MoveError> {
        let controller = MechanismController::new(self.dispatcher.as_ref(), &self.move_program);
        self.state.move_mechanism(name, selection, &controller)
    }

    /// One watch/tag cycle.
    ///
    /// Polls the watcher and tags every newly appeared file with a
    /// snapshot taken before the first tag, so all files from one tick
    /// carry the same state.
    pub fn tick(&mut self) {
        let new_files = match self.watcher.poll() {
            Ok(files) => files,
            Err(err) => {
                warn!(
                    "directory poll of {} failed: {err}",
                    self.watcher.dir().display()
                );
                return;
            }
        };
        if new_files.is_empty() {
            return;
        }
        info!("New data files: {}", new_files.join(" "));

        let snapshot = self.state.snapshot();
        for name in new_files {
            let path = self.watcher.dir().join(&name);
            match self.tagger.tag(&path, &snapshot) {
                Ok(TagOutcome::Tagged) | Ok(TagOutcome::AlreadyTagged) => {}
                Err(err) => warn!("could not tag {name}: {err}"),
            }
        }
    }

    /// Runs the watch/tag loop forever on the configured cadence.
    ///
    /// There is no cancellation primitive; the loop ends with the process.
    pub async fn run(&mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick();
        }
    }
}
