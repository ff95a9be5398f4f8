use crate::error::SidecarError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

/// Process-lifetime state of the sidecar, distinct from the resource
/// monitor's own `monitoring`/`degraded`/`recovering` state machine
/// (SPEC_FULL.md §3 Monitor State, owned by `sidecar-resource-monitor`).
#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

/// Broadcasts `AppState` transitions to any task that cares (presently
/// just logging, but the inbound and monitor loops both consult
/// `current()` to decide whether to keep reading/sleeping).
pub struct StateManager {
    state: Arc<RwLock<AppState>>,
    state_tx: Sender<AppState>,
    state_rx: Receiver<AppState>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(AppState::Initializing)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: AppState) -> Result<(), SidecarError> {
        let mut current = self.state.write();

        let valid = matches!(
            (&*current, &new_state),
            (AppState::Initializing, AppState::Running)
                | (AppState::Running, AppState::ShuttingDown)
                | (AppState::ShuttingDown, AppState::Stopped)
        );

        if !valid {
            return Err(SidecarError::Fatal(format!(
                "invalid state transition: {:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::info!(target: "sidecar::state", from = ?*current, to = ?new_state, "state transition");
        *current = new_state.clone();
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> AppState {
        self.state.read().clone()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.current(), AppState::Running)
    }

    pub fn subscribe(&self) -> Receiver<AppState> {
        self.state_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions_succeed() {
        let mgr = StateManager::new();
        assert_eq!(mgr.current(), AppState::Initializing);
        mgr.transition(AppState::Running).unwrap();
        assert!(mgr.is_running());
        mgr.transition(AppState::ShuttingDown).unwrap();
        mgr.transition(AppState::Stopped).unwrap();
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mgr = StateManager::new();
        assert!(mgr.transition(AppState::Stopped).is_err());
    }
}
