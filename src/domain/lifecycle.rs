//! Worker lifecycle states.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Identifies one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct WorkerId(Uuid);

impl WorkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a worker version.
///
/// Versions move forward through `Parsed → Installing → Installed →
/// Activating → Activated`; any live state may drop to `Redundant`, which is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    #[default]
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }

    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;

        match (self, next) {
            (Redundant, _) => false,
            (_, Redundant) => true,
            (Parsed, Installing)
            | (Installing, Installed)
            | (Installed, Activating)
            | (Activating, Activated) => true,
            _ => false,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid worker state transition from `{from}` to `{to}`")]
pub struct TransitionError {
    pub from: WorkerState,
    pub to: WorkerState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_path_is_allowed() {
        let path = [
            WorkerState::Parsed,
            WorkerState::Installing,
            WorkerState::Installed,
            WorkerState::Activating,
            WorkerState::Activated,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn skipping_states_is_rejected() {
        assert!(!WorkerState::Parsed.can_transition_to(WorkerState::Installed));
        assert!(!WorkerState::Installing.can_transition_to(WorkerState::Activated));
        assert!(!WorkerState::Activated.can_transition_to(WorkerState::Installing));
    }

    #[test]
    fn redundant_is_reachable_and_terminal() {
        assert!(WorkerState::Installing.can_transition_to(WorkerState::Redundant));
        assert!(WorkerState::Activated.can_transition_to(WorkerState::Redundant));
        assert!(!WorkerState::Redundant.can_transition_to(WorkerState::Redundant));
        assert!(!WorkerState::Redundant.can_transition_to(WorkerState::Parsed));
    }

    #[test]
    fn worker_ids_are_unique() {
        assert_ne!(WorkerId::new(), WorkerId::new());
    }

    #[test]
    fn state_serializes_as_snake_case() {
        let json = serde_json::to_string(&WorkerState::Activated).expect("serialize state");
        assert_eq!(json, "\"activated\"");
    }
}
