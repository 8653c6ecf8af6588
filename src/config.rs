//! Console configuration, loaded once at startup.
//!
//! Configuration comes from a TOML file (default `ifs-console.toml`)
//! merged with `IFS_`-prefixed environment variables, e.g.
//! `IFS_WATCH__PATTERN="*.fits"`. Every section has defaults, so the
//! console runs with no file at all: the stock mechanism set below
//! matches the instrument's as-built actuators.

use crate::error::{ConsoleError, ConsoleResult};
use crate::mechanism::{MechanismKind, MechanismState};
use crate::state::SessionInfo;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ifs-console.toml";

/// Top-level settings for the console.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// External control program paths and endpoints.
    pub console: ConsoleConfig,
    /// Directory watch target and cadence.
    pub watch: WatchConfig,
    /// Operator session fields stamped into data files.
    pub session: SessionConfig,
    /// Mechanism registry.
    pub mechanism: Vec<MechanismConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            console: ConsoleConfig::default(),
            watch: WatchConfig::default(),
            session: SessionConfig::default(),
            mechanism: default_mechanisms(),
        }
    }
}

/// External control programs the console invokes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Program that moves a mechanism axis to an encoder target.
    pub move_program: String,
    /// Program that drives the detector server.
    pub detector_program: String,
    /// Host argument passed to the detector program.
    pub detector_host: String,
    /// Detector server configuration file used at initialization.
    pub detector_config: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            move_program: "gpMcdMove.csh".to_string(),
            detector_program: "gpIfDetector_tester".to_string(),
            detector_host: "localhost".to_string(),
            detector_config: "config/gpIFDetector_cooldown.cfg".to_string(),
        }
    }
}

/// Where and how often to look for new data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory to watch.
    pub directory: PathBuf,
    /// Filename glob for data files.
    pub pattern: String,
    /// Seconds between polls.
    pub poll_interval_secs: f64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            pattern: "*.fits".to_string(),
            poll_interval_secs: 1.0,
        }
    }
}

/// Operator-supplied session fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub target: String,
    pub comments: String,
    pub observer: String,
}

impl SessionConfig {
    pub fn to_session(&self) -> SessionInfo {
        SessionInfo {
            target: self.target.clone(),
            comments: self.comments.clone(),
            observer: self.observer.clone(),
        }
    }
}

/// One mechanism definition: either a discrete position table or
/// `continuous = true`, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MechanismConfig {
    /// Operator-facing name.
    pub name: String,
    /// Physical actuator id.
    #[serde(default)]
    pub axis: u32,
    /// Header keyword used when tagging files.
    pub keyword: String,
    /// Label -> encoder count table for discrete mechanisms.
    #[serde(default)]
    pub positions: BTreeMap<String, i64>,
    /// True for continuous (numeric-target) mechanisms.
    #[serde(default)]
    pub continuous: bool,
}

impl MechanismConfig {
    /// Builds the runtime state for this mechanism.
    pub fn to_state(&self) -> MechanismState {
        let kind = if self.continuous {
            MechanismKind::Continuous
        } else {
            MechanismKind::Discrete(self.positions.clone())
        };
        MechanismState::new(&self.name, kind, self.axis, &self.keyword)
    }
}

impl Settings {
    /// Loads settings from the given file (or the default location) with
    /// environment overrides, then validates them.
    pub fn load(path: Option<&Path>) -> ConsoleResult<Self> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let settings: Settings = Figment::new()
            .merge(Toml::file(file))
            .merge(Env::prefixed("IFS_").split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Semantic checks beyond what parsing can catch.
    pub fn validate(&self) -> ConsoleResult<()> {
        // Upper bound keeps the value convertible to a Duration; one day
        // is already far beyond any sensible polling cadence.
        if !(self.watch.poll_interval_secs > 0.0 && self.watch.poll_interval_secs <= 86_400.0) {
            return Err(ConsoleError::Configuration(format!(
                "watch.poll_interval_secs must be in (0, 86400], got {}",
                self.watch.poll_interval_secs
            )));
        }
        let mut seen = std::collections::BTreeSet::new();
        for m in &self.mechanism {
            if m.name.trim().is_empty() {
                return Err(ConsoleError::Configuration(
                    "mechanism name cannot be empty".to_string(),
                ));
            }
            if !seen.insert(m.name.as_str()) {
                return Err(ConsoleError::Configuration(format!(
                    "duplicate mechanism name '{}'",
                    m.name
                )));
            }
            if m.continuous && !m.positions.is_empty() {
                return Err(ConsoleError::Configuration(format!(
                    "mechanism '{}' is continuous but has a position table",
                    m.name
                )));
            }
            if !m.continuous && m.positions.is_empty() {
                return Err(ConsoleError::Configuration(format!(
                    "mechanism '{}' has no positions and is not continuous",
                    m.name
                )));
            }
        }
        Ok(())
    }

    /// Builds the live mechanism registry from this configuration.
    pub fn mechanism_states(&self) -> Vec<MechanismState> {
        self.mechanism.iter().map(MechanismConfig::to_state).collect()
    }
}

fn discrete(name: &str, axis: u32, keyword: &str, positions: &[(&str, i64)]) -> MechanismConfig {
    MechanismConfig {
        name: name.to_string(),
        axis,
        keyword: keyword.to_string(),
        positions: positions
            .iter()
            .map(|(l, e)| (l.to_string(), *e))
            .collect(),
        continuous: false,
    }
}

/// The instrument's as-built mechanism set.
fn default_mechanisms() -> Vec<MechanismConfig> {
    vec![
        discrete(
            "Filter",
            0,
            "FILTER",
            &[("Y", 800), ("J", 400), ("H", 0), ("K1", 1200), ("K2", 1600)],
        ),
        discrete(
            "Prism",
            0,
            "PRISM",
            &[("Spectral", 9200), ("Wollaston", 0), ("None", 4600)],
        ),
        discrete("PupilCam", 0, "PUPILMIR", &[("Inserted", -300), ("Removed", 3400)]),
        discrete("Lyot", 0, "LYOT", &[("L1", 0), ("L2", 200)]),
        MechanismConfig {
            name: "Focus".to_string(),
            axis: 5,
            keyword: "FOCUS".to_string(),
            positions: BTreeMap::new(),
            continuous: true,
        },
    ]
}
