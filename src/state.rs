//! Live instrument state registry and point-in-time snapshots.
//!
//! [`InstrumentState`] is the single owned home for everything that gets
//! stamped into data files: the mechanism registry plus the free-text
//! session fields the operator fills in (target, comments, observer). It
//! is built once from configuration and mutated only through
//! [`InstrumentState::move_mechanism`]. Tagging never reads the live
//! state directly; it works from an [`InstrumentSnapshot`] taken at the
//! start of the tick, so a move can never half-apply to a file.

use crate::error::MoveError;
use crate::mechanism::{MechanismController, MechanismState, PositionValue, Selection};
use log::info;

/// Free-text session fields supplied by the operator before tagging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub target: String,
    pub comments: String,
    pub observer: String,
}

/// The authoritative registry of mechanism states and session fields.
#[derive(Debug, Clone)]
pub struct InstrumentState {
    mechanisms: Vec<MechanismState>,
    session: SessionInfo,
}

/// Immutable copy of the instrument state at one point in time.
///
/// Created fresh for every tagging tick and discarded after use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentSnapshot {
    pub target: String,
    pub comments: String,
    pub observer: String,
    /// `(header keyword, display value)` per mechanism, in registry order.
    pub mechanisms: Vec<(String, String)>,
}

impl InstrumentState {
    pub fn new(mechanisms: Vec<MechanismState>, session: SessionInfo) -> Self {
        Self {
            mechanisms,
            session,
        }
    }

    pub fn mechanisms(&self) -> &[MechanismState] {
        &self.mechanisms
    }

    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    pub fn set_session(&mut self, session: SessionInfo) {
        self.session = session;
    }

    /// Moves the named mechanism through the given controller.
    ///
    /// The mechanism's recorded position updates only if the controller
    /// reports success; see [`MechanismController::move_to`].
    pub fn move_mechanism(
        &mut self,
        name: &str,
        selection: &Selection,
        controller: &MechanismController<'_>,
    ) -> Result<PositionValue, MoveError> {
        let mechanism = self
            .mechanisms
            .iter_mut()
            .find(|m| m.name == name)
            .ok_or_else(|| MoveError::UnknownMechanism(name.to_string()))?;
        controller.move_to(mechanism, selection)
    }

    /// Takes an immutable snapshot of session fields and positions.
    pub fn snapshot(&self) -> InstrumentSnapshot {
        InstrumentSnapshot {
            target: self.session.target.clone(),
            comments: self.session.comments.clone(),
            observer: self.session.observer.clone(),
            mechanisms: self
                .mechanisms
                .iter()
                .map(|m| (m.keyword.clone(), m.current().to_string()))
                .collect(),
        }
    }

    /// Logs every header keyword and its current value, for the operator.
    pub fn log_keywords(&self) {
        info!("-- keywords --");
        info!("{:>8} = '{}'", "TARGET", self.session.target);
        info!("{:>8} = '{}'", "COMMENTS", self.session.comments);
        info!("{:>8} = '{}'", "OBSERVER", self.session.observer);
        for m in &self.mechanisms {
            info!("{:>8} = '{}'", m.keyword, m.current());
        }
    }
}
