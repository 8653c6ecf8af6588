//! Detector server commands: initialization, exposure setup, acquisition.
//!
//! These are thin sequences over the [`CommandDispatcher`] seam. Exit
//! codes are logged by the dispatcher and returned to the caller; a
//! non-zero code never raises here. The filename auto-increment is
//! unconditional by design, so a failed exposure still advances the
//! counter exactly as the operators expect.

use crate::config::ConsoleConfig;
use crate::dispatch::CommandDispatcher;
use crate::error::DispatchError;
use log::info;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Detector readout configuration: `mode nreads ncoadds`.
///
/// Modes: 1=single, 2=CDS, 3=MCDS, 4=UTR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadMode {
    pub mode: u8,
    pub nreads: u32,
    pub ncoadds: u32,
}

impl Default for ReadMode {
    fn default() -> Self {
        Self {
            mode: 2,
            nreads: 1,
            ncoadds: 1,
        }
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.mode, self.nreads, self.ncoadds)
    }
}

impl FromStr for ReadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(format!("expected 'mode nreads ncoadds', got '{s}'"));
        }
        let parse = |what: &str, text: &str| -> Result<u32, String> {
            text.parse()
                .map_err(|_| format!("{what} '{text}' is not a positive integer"))
        };
        let mode = parse("mode", parts[0])?;
        if !(1..=4).contains(&mode) {
            return Err(format!("mode must be 1-4, got {mode}"));
        }
        Ok(Self {
            mode: mode as u8,
            nreads: parse("nreads", parts[1])?,
            ncoadds: parse("ncoadds", parts[2])?,
        })
    }
}

/// Drives the detector server through the external control program.
pub struct DetectorConsole<'a> {
    dispatcher: &'a dyn CommandDispatcher,
    config: &'a ConsoleConfig,
}

impl<'a> DetectorConsole<'a> {
    pub fn new(dispatcher: &'a dyn CommandDispatcher, config: &'a ConsoleConfig) -> Self {
        Self { dispatcher, config }
    }

    fn run(&self, args: &[&str]) -> Result<i32, DispatchError> {
        let mut argv = vec![self.config.detector_host.as_str()];
        argv.extend_from_slice(args);
        self.dispatcher
            .dispatch(&self.config.detector_program, &argv)
    }

    /// Starts the detector server and initializes the hardware.
    pub fn initialize(&self) -> Result<i32, DispatchError> {
        let code = self.run(&["initializeServer", &self.config.detector_config])?;
        if code != 0 {
            return Ok(code);
        }
        self.run(&["initializeHardware"])
    }

    /// Configures the exposure: integration time and readout mode.
    ///
    /// `itime_secs` is converted to integer microseconds for the server.
    pub fn configure(&self, itime_secs: f64, mode: &ReadMode) -> Result<i32, DispatchError> {
        let itime_us = (itime_secs * 1_000_000.0).round() as i64;
        self.run(&[
            "configureExposure",
            &itime_us.to_string(),
            &mode.mode.to_string(),
            &mode.nreads.to_string(),
            &mode.ncoadds.to_string(),
        ])
    }

    /// Starts one exposure writing to `out_path`.
    pub fn take_exposure(&self, out_path: &str) -> Result<i32, DispatchError> {
        info!("Taking an exposure to {out_path}");
        self.run(&["startExposure", out_path, "0"])
    }

    /// Shuts the detector server down.
    pub fn shutdown(&self) -> Result<i32, DispatchError> {
        self.run(&["shutdown", "1"])
    }
}

/// Date-stamped default output directory name, e.g. `250823` for
/// 2025-08-23, matching the observatory's nightly directory convention.
pub fn default_output_dir() -> String {
    chrono::Local::now().format("%y%m%d").to_string()
}

/// Increments the trailing integer in a base filename, keeping its
/// zero-padding: `test0009` becomes `test0010`. Returns `None` when the
/// name carries no digits or the counter does not fit in a `u64`.
pub fn next_filename(name: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        let re = Regex::new(r"^(.*?)([0-9]+)$").expect("literal regex");
        re
    });
    let caps = re.captures(name)?;
    let digits = caps.get(2)?.as_str();
    let next = digits.parse::<u64>().ok()?.checked_add(1)?;
    Some(format!(
        "{}{:0width$}",
        caps.get(1)?.as_str(),
        next,
        width = digits.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MockDispatcher;

    fn config() -> ConsoleConfig {
        ConsoleConfig::default()
    }

    #[test]
    fn read_mode_parses_and_prints() {
        let mode: ReadMode = "2 1 1".parse().unwrap();
        assert_eq!(mode, ReadMode::default());
        assert_eq!(mode.to_string(), "2 1 1");

        assert!("5 1 1".parse::<ReadMode>().is_err());
        assert!("2 1".parse::<ReadMode>().is_err());
        assert!("x y z".parse::<ReadMode>().is_err());
    }

    #[test]
    fn configure_converts_itime_to_microseconds() {
        let dispatcher = MockDispatcher::new();
        let cfg = config();
        let detector = DetectorConsole::new(&dispatcher, &cfg);

        detector.configure(1.4, &ReadMode::default()).unwrap();
        assert_eq!(
            dispatcher.calls(),
            vec!["gpIfDetector_tester localhost configureExposure 1400000 2 1 1"]
        );
    }

    #[test]
    fn initialize_runs_server_then_hardware() {
        let dispatcher = MockDispatcher::new();
        let cfg = config();
        DetectorConsole::new(&dispatcher, &cfg).initialize().unwrap();

        let calls = dispatcher.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].contains("initializeServer"));
        assert!(calls[1].ends_with("initializeHardware"));
    }

    #[test]
    fn failed_server_init_skips_hardware_init() {
        let dispatcher = MockDispatcher::with_script(vec![Ok(1)]);
        let cfg = config();
        let code = DetectorConsole::new(&dispatcher, &cfg).initialize().unwrap();
        assert_eq!(code, 1);
        assert_eq!(dispatcher.calls().len(), 1);
    }

    #[test]
    fn exposure_passes_destination_path() {
        let dispatcher = MockDispatcher::new();
        let cfg = config();
        DetectorConsole::new(&dispatcher, &cfg)
            .take_exposure("/data/250823/test0001.fits")
            .unwrap();
        assert!(dispatcher.calls()[0]
            .ends_with("startExposure /data/250823/test0001.fits 0"));
    }

    #[test]
    fn default_output_dir_is_a_six_digit_date() {
        let dir = default_output_dir();
        assert_eq!(dir.len(), 6);
        assert!(dir.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn filename_increment_preserves_padding() {
        assert_eq!(next_filename("test0001").as_deref(), Some("test0002"));
        assert_eq!(next_filename("test0009").as_deref(), Some("test0010"));
        assert_eq!(next_filename("test9").as_deref(), Some("test10"));
        assert_eq!(next_filename("dark_099").as_deref(), Some("dark_100"));
        assert_eq!(next_filename("nodigits"), None);
    }
}
