use actix::Addr;
use serde::Serialize;
use std::sync::Arc;

use crate::history::{Dispatch, HistoryAction, HistoryStore};
use crate::network::{Broadcaster, Message};

/// Human-readable label for an action value, used only for display
pub trait Describe {
    fn describe(&self) -> String;
}

/// An application's state transition function.
///
/// Must be free of side effects other than the effects it returns.
pub trait Reducer {
    type State;
    type Action;
    type Effect;

    fn reduce(&self, state: &mut Self::State, action: Self::Action) -> Vec<Self::Effect>;
}

/// Local destination for recorded transitions
pub trait HistorySink: Send + Sync {
    fn append(&self, label: String, data: Option<Vec<u8>>);
}

impl HistorySink for Addr<HistoryStore> {
    fn append(&self, label: String, data: Option<Vec<u8>>) {
        self.do_send(Dispatch(HistoryAction::AppendTransition(label, data)));
    }
}

/// Serialize application state the way it travels in a `record` message
pub fn encode_state<S: Serialize>(state: &S) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(state)
}

/// Wraps a reducer so every transition is recorded.
///
/// After the inner reducer runs, the new state is serialized and appended
/// to the local history and/or broadcast as a `record` message. When
/// serialization fails nothing is recorded and the inner effects are
/// returned untouched.
pub struct Recorder<R> {
    inner: R,
    history: Option<Arc<dyn HistorySink>>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
}

impl<R> Recorder<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            history: None,
            broadcaster: None,
        }
    }

    /// Append every transition to a local history store
    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    /// Also send every transition to all peers
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn is_broadcasting(&self) -> bool {
        self.broadcaster.is_some()
    }

    fn record(&self, label: String, data: Vec<u8>) {
        if let Some(broadcaster) = &self.broadcaster {
            tracing::debug!("📡 Broadcasting state after '{}'", label);
            broadcaster.broadcast(&Message::record(label.clone(), data.clone()));
        }
        if let Some(history) = &self.history {
            history.append(label, Some(data));
        }
    }
}

impl<R> Reducer for Recorder<R>
where
    R: Reducer,
    R::State: Serialize,
    R::Action: Describe,
{
    type State = R::State;
    type Action = R::Action;
    type Effect = R::Effect;

    fn reduce(&self, state: &mut Self::State, action: Self::Action) -> Vec<Self::Effect> {
        let label = action.describe();
        let effects = self.inner.reduce(state, action);

        match encode_state(state) {
            Ok(data) => self.record(label, data),
            Err(e) => tracing::warn!("Not recording '{}': state did not serialize: {}", label, e),
        }

        effects
    }
}
