//! Mechanism position model and the controller that moves them.
//!
//! Each mechanical mechanism (filter wheel, prism, mirror, stage) is
//! either discrete, with a fixed table of named positions mapped to
//! encoder counts, or continuous, accepting any raw integer target. The
//! recorded position only ever changes after the control program reports
//! success, so a failed or rejected move can never corrupt the state that
//! later gets stamped into data files.

use crate::dispatch::CommandDispatcher;
use crate::error::MoveError;
use log::info;
use std::collections::BTreeMap;
use std::fmt;

/// Display text for a mechanism whose position has never been commanded.
pub const UNKNOWN_POSITION: &str = "-Unknown-";

/// How a mechanism's targets are expressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MechanismKind {
    /// Named positions with their encoder counts.
    Discrete(BTreeMap<String, i64>),
    /// Any integer encoder target is legal.
    Continuous,
}

/// The operator's requested target for a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Nothing selected.
    None,
    /// A named discrete position.
    Label(String),
    /// Free-form text, resolved against the mechanism's kind: a position
    /// label for discrete mechanisms, an integer for continuous ones.
    Raw(String),
}

/// Last successfully commanded position of a mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionValue {
    /// No move has succeeded yet this run.
    Unknown,
    /// A discrete position, by label and resolved encoder count.
    Label { label: String, encoder: i64 },
    /// A raw encoder count on a continuous mechanism.
    Encoder(i64),
}

impl fmt::Display for PositionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionValue::Unknown => f.write_str(UNKNOWN_POSITION),
            PositionValue::Label { label, .. } => f.write_str(label),
            PositionValue::Encoder(encoder) => write!(f, "{encoder}"),
        }
    }
}

/// One actuator: identity, legal positions, and the last commanded value.
#[derive(Debug, Clone)]
pub struct MechanismState {
    /// Operator-facing mechanism name, e.g. "Filter".
    pub name: String,
    /// Discrete position table or continuous.
    pub kind: MechanismKind,
    /// Physical actuator id passed to the control program.
    pub axis: u32,
    /// Header keyword used when stamping data files, e.g. "FILTER".
    pub keyword: String,
    current: PositionValue,
}

impl MechanismState {
    pub fn new(name: &str, kind: MechanismKind, axis: u32, keyword: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            axis,
            keyword: keyword.to_string(),
            current: PositionValue::Unknown,
        }
    }

    /// The last successfully commanded position.
    pub fn current(&self) -> &PositionValue {
        &self.current
    }

    /// Resolves a selection to the position it would command.
    ///
    /// Pure: does not touch `current`. Discrete mechanisms require a label
    /// from their table; continuous mechanisms parse the text as an
    /// integer encoder target.
    pub fn resolve(&self, selection: &Selection) -> Result<PositionValue, MoveError> {
        match &self.kind {
            MechanismKind::Discrete(table) => {
                let label = match selection {
                    Selection::Label(l) | Selection::Raw(l) => l,
                    Selection::None => return Err(MoveError::NoSelection(self.name.clone())),
                };
                let encoder = *table
                    .get(label)
                    .ok_or_else(|| MoveError::NoSelection(self.name.clone()))?;
                Ok(PositionValue::Label {
                    label: label.clone(),
                    encoder,
                })
            }
            MechanismKind::Continuous => {
                let text = match selection {
                    Selection::Label(t) | Selection::Raw(t) => t.as_str(),
                    Selection::None => return Err(MoveError::InvalidValue(String::new())),
                };
                let encoder = text
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| MoveError::InvalidValue(text.to_string()))?;
                Ok(PositionValue::Encoder(encoder))
            }
        }
    }
}

/// Executes mechanism moves through the hardware-control program.
pub struct MechanismController<'a> {
    dispatcher: &'a dyn CommandDispatcher,
    move_program: &'a str,
}

impl<'a> MechanismController<'a> {
    pub fn new(dispatcher: &'a dyn CommandDispatcher, move_program: &'a str) -> Self {
        Self {
            dispatcher,
            move_program,
        }
    }

    /// Moves one mechanism to the selected position.
    ///
    /// Resolves the selection, invokes the control program with the axis
    /// id and encoder target, and updates the recorded position only on a
    /// zero exit code. Any failure leaves the prior position intact.
    pub fn move_to(
        &self,
        mechanism: &mut MechanismState,
        selection: &Selection,
    ) -> Result<PositionValue, MoveError> {
        let resolved = match mechanism.resolve(selection) {
            Ok(resolved) => resolved,
            Err(err) => {
                // The audit trail records rejected attempts too.
                info!(
                    "MOVE rejected for {}: {err} (selection: {selection:?})",
                    mechanism.name
                );
                return Err(err);
            }
        };
        let (encoder, label) = match &resolved {
            PositionValue::Label { label, encoder } => (*encoder, Some(label.as_str())),
            PositionValue::Encoder(encoder) => (*encoder, None),
            PositionValue::Unknown => return Err(MoveError::NoSelection(mechanism.name.clone())),
        };
        match label {
            Some(l) => info!(
                "MOVE mechanism: {} \tposition {} \titem: {}",
                mechanism.name, encoder, l
            ),
            None => info!("MOVE mechanism: {} \tposition {}", mechanism.name, encoder),
        }

        let axis = mechanism.axis.to_string();
        let target = encoder.to_string();
        let code = self
            .dispatcher
            .dispatch(self.move_program, &[axis.as_str(), target.as_str()])?;
        if code != 0 {
            return Err(MoveError::CommandRejected(code));
        }
        mechanism.current = resolved.clone();
        Ok(resolved)
    }
}
