use super::state::HistoryLogState;
use super::types::{Step, StepIndex};
use crate::network::messages::Message;

/// Inputs to the history state machine
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryAction {
    /// Record a transition. Absent data is dropped.
    AppendTransition(String, Option<Vec<u8>>),
    /// Select a step, or clear the selection with `None`
    SelectStep(Option<Step>),
    DeleteSelected,
    NavigateBack,
    NavigateForward,
    /// Ask peers to restore this state
    ApplyReplay(Option<Vec<u8>>),
    /// A history row was picked by its step index
    RowSelected(StepIndex),
}

/// Outbound work produced by the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Restore the host application to this snapshot
    Replay(Option<Vec<u8>>),
    /// Send this message to every peer
    Broadcast(Message),
}

/// Apply an action to the log and return the effects it produces.
///
/// Pure apart from logging; effect execution is left to the caller.
pub fn reduce(state: &mut HistoryLogState, action: HistoryAction) -> Vec<Effect> {
    match action {
        HistoryAction::AppendTransition(label, Some(data)) => append_transition(state, label, data),
        HistoryAction::AppendTransition(label, None) => {
            tracing::warn!("Dropping transition '{}' without state", label);
            Vec::new()
        }
        HistoryAction::SelectStep(step) => select_step(state, step),
        HistoryAction::DeleteSelected => delete_selected(state),
        HistoryAction::NavigateBack => navigate_back(state),
        HistoryAction::NavigateForward => navigate_forward(state),
        HistoryAction::ApplyReplay(data) => apply_replay(state, data),
        HistoryAction::RowSelected(index) => row_selected(state, index),
    }
}

fn append_transition(state: &mut HistoryLogState, label: String, data: Vec<u8>) -> Vec<Effect> {
    let index = state.push(label, Some(data));
    state.selection = Some(index);

    tracing::debug!("Appended step {} ({} steps in log)", index, state.len());
    Vec::new()
}

fn select_step(state: &mut HistoryLogState, step: Option<Step>) -> Vec<Effect> {
    let step = match step {
        Some(step) => step,
        None => {
            state.selection = None;
            return Vec::new();
        }
    };

    debug_assert!(
        state.contains(step.index),
        "selected step {} is not in the history log",
        step.index
    );

    // The logged copy is authoritative for the payload
    match state.get(step.index) {
        Some(logged) => {
            let payload = logged.resulting_state.clone();
            state.selection = Some(step.index);
            vec![Effect::Replay(payload)]
        }
        None => {
            tracing::warn!("Ignoring selection of unknown step {}", step.index);
            Vec::new()
        }
    }
}

fn delete_selected(state: &mut HistoryLogState) -> Vec<Effect> {
    let current = match state.selection {
        Some(index) => index,
        None => return Vec::new(),
    };

    let previous = state.step_before(current).cloned();
    if state.remove(current).is_none() {
        tracing::warn!("Selection {} pointed outside the log, clearing it", current);
        state.selection = None;
        return Vec::new();
    }

    tracing::debug!("Deleted step {}", current);

    state.selection = previous.as_ref().map(|s| s.index);
    vec![Effect::Replay(previous.and_then(|s| s.resulting_state))]
}

fn navigate_back(state: &mut HistoryLogState) -> Vec<Effect> {
    let current = match state.selection {
        Some(index) => index,
        None => return Vec::new(),
    };

    match state.step_before(current) {
        Some(previous) => {
            let (index, payload) = (previous.index, previous.resulting_state.clone());
            state.selection = Some(index);
            vec![Effect::Replay(payload)]
        }
        None => Vec::new(),
    }
}

fn navigate_forward(state: &mut HistoryLogState) -> Vec<Effect> {
    let current = match state.selection {
        Some(index) => index,
        None => return Vec::new(),
    };

    // Can't advance past the tip
    if state.is_tip(current) {
        return Vec::new();
    }

    match state.step_after(current) {
        Some(next) => {
            let (index, payload) = (next.index, next.resulting_state.clone());
            state.selection = Some(index);
            vec![Effect::Replay(payload)]
        }
        None => Vec::new(),
    }
}

fn apply_replay(state: &HistoryLogState, data: Option<Vec<u8>>) -> Vec<Effect> {
    if !state.broadcast_enabled {
        return Vec::new();
    }

    vec![Effect::Broadcast(Message::reset(data))]
}

fn row_selected(state: &mut HistoryLogState, index: StepIndex) -> Vec<Effect> {
    // Rows can be stale by the time they are picked
    match state.get(index).cloned() {
        Some(step) => select_step(state, Some(step)),
        None => {
            tracing::debug!("Row {} no longer in the log", index);
            Vec::new()
        }
    }
}
