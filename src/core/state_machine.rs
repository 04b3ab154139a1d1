//! State machine for tracking the lifecycle of a single edit
//!
//! The lifecycle is strictly linear. Transitions are kept in memory for
//! diagnostics only; nothing is persisted between runs.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Edit lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Start,
    EditCreated,
    BundleUploaded,
    TrackUpdated,
    Committed,
    Aborted,
}

impl EditState {
    /// Whether `to` directly follows `self`
    pub fn can_transition_to(self, to: EditState) -> bool {
        matches!(
            (self, to),
            (Self::Start, Self::EditCreated)
                | (Self::EditCreated, Self::BundleUploaded)
                | (Self::BundleUploaded, Self::TrackUpdated)
                | (Self::TrackUpdated, Self::Committed)
                | (Self::TrackUpdated, Self::Aborted)
        )
    }
}

/// Rejected transition
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid edit transition {from:?} → {to:?}")]
pub struct InvalidTransition {
    pub from: EditState,
    pub to: EditState,
}

/// State transition
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    /// From state
    pub from: EditState,

    /// To state
    pub to: EditState,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Free-form detail, e.g. the edit id or version code
    pub detail: Option<String>,
}

/// Tracks the edit through its lifecycle
#[derive(Debug, Clone)]
pub struct EditStateMachine {
    current_state: EditState,
    transitions: Vec<StateTransition>,
}

impl Default for EditStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl EditStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: EditState::Start,
            transitions: Vec::new(),
        }
    }

    /// Transition to a new state
    pub fn transition(
        &mut self,
        to: EditState,
        detail: Option<String>,
    ) -> Result<(), InvalidTransition> {
        let from = self.current_state;
        if !from.can_transition_to(to) {
            return Err(InvalidTransition { from, to });
        }

        log::debug!(
            "edit state {:?} → {:?}{}",
            from,
            to,
            detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
        );

        self.transitions.push(StateTransition {
            from,
            to,
            timestamp: Utc::now(),
            detail,
        });
        self.current_state = to;

        Ok(())
    }

    /// Get current state
    pub fn get_state(&self) -> EditState {
        self.current_state
    }

    /// Recorded transitions, oldest first
    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Get elapsed time since the first transition in milliseconds
    pub fn get_elapsed_time(&self) -> i64 {
        match (self.transitions.first(), self.transitions.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_milliseconds(),
            _ => 0,
        }
    }

    /// Get transition history as human-readable string
    pub fn get_history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| {
                let detail = t
                    .detail
                    .as_deref()
                    .map(|d| format!(" ({d})"))
                    .unwrap_or_default();
                format!(
                    "{}: {:?} → {:?}{}",
                    t.timestamp.to_rfc3339(),
                    t.from,
                    t.to,
                    detail
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
