//! Operator console library for the IFS instrument.
//!
//! This crate tracks the commanded positions of the instrument's
//! mechanisms, dispatches positioning and exposure commands to the
//! external hardware-control programs, and stamps newly produced FITS
//! files with the instrument state that was in effect when they were
//! acquired.
//!
//! The moving parts:
//!
//! - [`mechanism`]: discrete and continuous actuator model plus the
//!   controller that executes moves.
//! - [`dispatch`]: the seam to the external control programs.
//! - [`watcher`] and [`tagger`]: the new-file detection and exactly-once
//!   header stamping pipeline.
//! - [`engine`]: ties it together on a fixed polling cadence.
//! - [`detector`]: exposure and detector-server command sequences.

pub mod config;
pub mod detector;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fits;
pub mod mechanism;
pub mod state;
pub mod tagger;
pub mod watcher;
