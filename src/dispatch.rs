//! Dispatch of commands to the external hardware-control programs.
//!
//! The instrument hardware is driven through opaque command-line tools;
//! the console's only contract with them is "runs synchronously, returns
//! an integer status". [`CommandDispatcher`] is the seam that the
//! mechanism controller and the detector commands go through, so tests
//! and dry runs can substitute [`MockDispatcher`] for the real thing.

use crate::error::DispatchError;
use log::info;
use std::collections::VecDeque;
use std::process::Command;
use std::sync::Mutex;

/// Executes an external control program and reports its exit code.
///
/// A non-zero exit code is returned as data, never as an error; only a
/// failure to run the program at all is a [`DispatchError`]. Every
/// invocation and its exit code are logged for the operator audit trail.
pub trait CommandDispatcher: Send + Sync {
    /// Runs `program` with `args`, blocking until it exits.
    fn dispatch(&self, program: &str, args: &[&str]) -> Result<i32, DispatchError>;
}

/// Dispatcher that actually spawns the control program as a child process.
///
/// The call blocks the current thread for the lifetime of the child; no
/// timeout is imposed, so a hung control program hangs the calling path.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellDispatcher;

impl ShellDispatcher {
    pub fn new() -> Self {
        Self
    }
}

impl CommandDispatcher for ShellDispatcher {
    fn dispatch(&self, program: &str, args: &[&str]) -> Result<i32, DispatchError> {
        info!(">    {} {}", program, args.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| DispatchError::LaunchFailed {
                program: program.to_string(),
                source,
            })?;
        let code = status
            .code()
            .ok_or_else(|| DispatchError::NoExitCode(program.to_string()))?;
        info!("     return code = {code}");
        Ok(code)
    }
}

/// Test double that records invocations and returns scripted exit codes.
///
/// Results are consumed in order; once the script runs out every further
/// dispatch succeeds with exit code 0.
#[derive(Debug, Default)]
pub struct MockDispatcher {
    calls: Mutex<Vec<String>>,
    script: Mutex<VecDeque<Result<i32, DispatchError>>>,
}

impl MockDispatcher {
    /// A dispatcher that accepts everything with exit code 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher that plays back the given results in order.
    pub fn with_script(script: Vec<Result<i32, DispatchError>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(script.into()),
        }
    }

    /// The command lines dispatched so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl CommandDispatcher for MockDispatcher {
    fn dispatch(&self, program: &str, args: &[&str]) -> Result<i32, DispatchError> {
        let line = format!("{} {}", program, args.join(" "));
        info!(">    {line}");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line);
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or(Ok(0))
    }
}
