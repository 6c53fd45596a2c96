use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::network::{Message, MessageKind, Transceiver};
use crate::util::errors::Result;

/// Host application hook that restores live state from a snapshot.
///
/// `None` means restore the application's own initial state.
pub trait ReplaySink: Send + Sync {
    fn restore(&self, state: Option<Vec<u8>>);
}

impl<F> ReplaySink for F
where
    F: Fn(Option<Vec<u8>>) + Send + Sync,
{
    fn restore(&self, state: Option<Vec<u8>>) {
        self(state)
    }
}

/// Decode a snapshot produced by the recorder, falling back to the default
/// state when there is none
pub fn decode_state<S>(data: Option<&[u8]>) -> Result<S>
where
    S: DeserializeOwned + Default,
{
    match data {
        Some(bytes) => Ok(serde_json::from_slice(bytes)?),
        None => Ok(S::default()),
    }
}

/// Queue inbound `reset` messages for the application. `record` messages
/// are left to history viewers.
///
/// Handlers run on the swarm task, so resets are handed over on a channel
/// and applied by whichever loop owns the application state, in arrival
/// order.
pub fn subscribe_resets(transceiver: &Transceiver) -> mpsc::UnboundedReceiver<Option<Vec<u8>>> {
    let (sender, receiver) = mpsc::unbounded_channel();
    transceiver.on_receive::<Message, _>(move |message, delivery| {
        if message.kind != MessageKind::Reset {
            return;
        }
        tracing::info!("Reset requested by {}", delivery.from);
        if sender.send(message.state).is_err() {
            tracing::debug!("Application stopped listening for resets");
        }
    });
    receiver
}
