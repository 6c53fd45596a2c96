use actix::prelude::*;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::reducer::{reduce, Effect, HistoryAction};
use super::state::HistoryLogState;
use super::types::{Step, StepIndex};
use crate::network::messages::{Message as WireMessage, MessageKind};
use crate::network::Broadcaster;
use crate::recorder::ReplaySink;

/// Where a remote transition came from, used to drop re-deliveries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub peer: String,
    pub sequence: u64,
}

/// Run an action through the store and execute its effects
#[derive(Message, Debug, Clone)]
#[rtype(result = "DispatchOutcome")]
pub struct Dispatch(pub HistoryAction);

/// Every effect produced while handling a [`Dispatch`], in execution order
#[derive(Debug, Clone, Default, MessageResponse)]
pub struct DispatchOutcome {
    pub effects: Vec<Effect>,
}

/// A message received from a peer
#[derive(Message, Debug, Clone)]
#[rtype(result = "bool")]
pub struct ReceiveTransition {
    pub origin: Option<Origin>,
    pub message: WireMessage,
}

#[derive(Message)]
#[rtype(result = "HistorySnapshot")]
pub struct GetHistory;

/// Read-only copy of the log for presentation layers
#[derive(Debug, Clone, MessageResponse)]
pub struct HistorySnapshot {
    /// Steps in append order
    pub history: Vec<Step>,
    pub selection: Option<StepIndex>,
    pub broadcast_enabled: bool,
}

impl HistorySnapshot {
    pub fn selected(&self) -> Option<&Step> {
        let index = self.selection?;
        self.history.iter().find(|s| s.index == index)
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct SetBroadcastEnabled(pub bool);

/// How far behind the newest sequence a peer's messages are still tracked
const SEQUENCE_WINDOW: u64 = 64;

/// Sequences already seen from one peer: the highest, plus a bitmap of the
/// `SEQUENCE_WINDOW` below it
#[derive(Debug, Default)]
struct SeenSequences {
    highest: Option<u64>,
    window: u64,
}

impl SeenSequences {
    /// Mark a sequence as seen. Returns false for repeats and for anything
    /// older than the window.
    fn insert(&mut self, sequence: u64) -> bool {
        let Some(highest) = self.highest else {
            self.highest = Some(sequence);
            self.window = 1;
            return true;
        };

        if sequence > highest {
            let shift = sequence - highest;
            self.window = if shift >= SEQUENCE_WINDOW { 0 } else { self.window << shift };
            self.window |= 1;
            self.highest = Some(sequence);
            return true;
        }

        let offset = highest - sequence;
        if offset >= SEQUENCE_WINDOW {
            return false;
        }
        let bit = 1u64 << offset;
        if self.window & bit != 0 {
            return false;
        }
        self.window |= bit;
        true
    }
}

/// Single owner of the history log.
///
/// Local recordings and transitions received from peers both arrive as
/// actor messages, so appends are serialized and indices stay unique.
pub struct HistoryStore {
    state: HistoryLogState,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    replay_sink: Option<Arc<dyn ReplaySink>>,
    delivered: HashMap<String, SeenSequences>,
}

impl HistoryStore {
    pub fn new(broadcast_enabled: bool) -> Self {
        Self::with_state(HistoryLogState::new(broadcast_enabled))
    }

    pub fn with_state(state: HistoryLogState) -> Self {
        Self {
            state,
            broadcaster: None,
            replay_sink: None,
            delivered: HashMap::new(),
        }
    }

    /// Transport used for `reset` broadcasts
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Application restored in-process on every replay
    pub fn with_replay_sink(mut self, sink: Arc<dyn ReplaySink>) -> Self {
        self.replay_sink = Some(sink);
        self
    }

    pub fn state(&self) -> &HistoryLogState {
        &self.state
    }

    /// Reduce an action and interpret the effects it yields.
    ///
    /// Replays are fed back as `ApplyReplay`; broadcasts are handed to the
    /// transport without waiting for delivery.
    pub fn dispatch(&mut self, action: HistoryAction) -> Vec<Effect> {
        let mut queue = VecDeque::from([action]);
        let mut executed = Vec::new();

        while let Some(action) = queue.pop_front() {
            for effect in reduce(&mut self.state, action) {
                match &effect {
                    Effect::Replay(data) => {
                        if let Some(sink) = &self.replay_sink {
                            sink.restore(data.clone());
                        }
                        queue.push_back(HistoryAction::ApplyReplay(data.clone()));
                    }
                    Effect::Broadcast(message) => match &self.broadcaster {
                        // A picked subset of peers takes precedence over everyone
                        Some(broadcaster) => {
                            if !broadcaster.send_to_selected(message) {
                                broadcaster.broadcast(message);
                            }
                        }
                        None => tracing::debug!("No transport attached, dropping {} message", message.kind),
                    },
                }
                executed.push(effect);
            }
        }

        executed
    }

    /// Append a transition received from a peer. Returns false when the
    /// message was dropped.
    pub fn receive(&mut self, origin: Option<Origin>, message: WireMessage) -> bool {
        if message.kind != MessageKind::Record {
            tracing::debug!("History store ignores {} messages", message.kind);
            return false;
        }

        if let Some(origin) = origin {
            let fresh = self
                .delivered
                .entry(origin.peer.clone())
                .or_default()
                .insert(origin.sequence);
            if !fresh {
                tracing::debug!(
                    "Dropping duplicate transition {} from {}",
                    origin.sequence,
                    origin.peer
                );
                return false;
            }
        }

        let before = self.state.len();
        self.dispatch(HistoryAction::AppendTransition(message.action, message.state));
        self.state.len() > before
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            history: self.state.history.clone(),
            selection: self.state.selection,
            broadcast_enabled: self.state.broadcast_enabled,
        }
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Actor for HistoryStore {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            "History store started (broadcast {})",
            if self.state.broadcast_enabled { "enabled" } else { "disabled" }
        );
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("History store stopped with {} steps", self.state.len());
    }
}

impl Handler<Dispatch> for HistoryStore {
    type Result = DispatchOutcome;

    fn handle(&mut self, msg: Dispatch, _ctx: &mut Self::Context) -> Self::Result {
        DispatchOutcome {
            effects: self.dispatch(msg.0),
        }
    }
}

impl Handler<ReceiveTransition> for HistoryStore {
    type Result = bool;

    fn handle(&mut self, msg: ReceiveTransition, _ctx: &mut Self::Context) -> Self::Result {
        self.receive(msg.origin, msg.message)
    }
}

impl Handler<GetHistory> for HistoryStore {
    type Result = HistorySnapshot;

    fn handle(&mut self, _msg: GetHistory, _ctx: &mut Self::Context) -> Self::Result {
        self.snapshot()
    }
}

impl Handler<SetBroadcastEnabled> for HistoryStore {
    type Result = ();

    fn handle(&mut self, msg: SetBroadcastEnabled, _ctx: &mut Self::Context) -> Self::Result {
        tracing::info!("Replay broadcast {}", if msg.0 { "enabled" } else { "disabled" });
        self.state.broadcast_enabled = msg.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingBroadcaster {
        sent: Mutex<Vec<WireMessage>>,
    }

    impl Broadcaster for CountingBroadcaster {
        fn broadcast(&self, message: &WireMessage) {
            self.sent.lock().unwrap().push(message.clone());
        }
    }

    /// Peer subset double: sends to the subset once one is picked
    #[derive(Default)]
    struct SubsetTransport {
        picked: Mutex<bool>,
        broadcast: Mutex<Vec<WireMessage>>,
        directed: Mutex<Vec<WireMessage>>,
    }

    impl Broadcaster for SubsetTransport {
        fn broadcast(&self, message: &WireMessage) {
            self.broadcast.lock().unwrap().push(message.clone());
        }

        fn send_to_selected(&self, message: &WireMessage) -> bool {
            if !*self.picked.lock().unwrap() {
                return false;
            }
            self.directed.lock().unwrap().push(message.clone());
            true
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        restored: Mutex<Vec<Option<Vec<u8>>>>,
    }

    impl ReplaySink for RecordingSink {
        fn restore(&self, state: Option<Vec<u8>>) {
            self.restored.lock().unwrap().push(state);
        }
    }

    fn append(store: &mut HistoryStore, label: &str, data: &[u8]) {
        store.dispatch(HistoryAction::AppendTransition(
            label.to_string(),
            Some(data.to_vec()),
        ));
    }

    #[test]
    fn test_replay_is_broadcast_as_reset() {
        let transport = Arc::new(CountingBroadcaster::default());
        let mut store = HistoryStore::new(true).with_broadcaster(transport.clone());
        append(&mut store, "login", b"A");
        append(&mut store, "open", b"B");

        let effects = store.dispatch(HistoryAction::NavigateBack);
        assert_eq!(
            effects,
            vec![
                Effect::Replay(Some(b"A".to_vec())),
                Effect::Broadcast(WireMessage::reset(Some(b"A".to_vec()))),
            ]
        );

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[WireMessage::reset(Some(b"A".to_vec()))]);
    }

    #[test]
    fn test_reset_follows_picked_peer_subset() {
        let transport = Arc::new(SubsetTransport::default());
        let mut store = HistoryStore::new(true).with_broadcaster(transport.clone());
        append(&mut store, "login", b"A");
        append(&mut store, "open", b"B");

        store.dispatch(HistoryAction::NavigateBack);
        assert_eq!(transport.broadcast.lock().unwrap().len(), 1);
        assert!(transport.directed.lock().unwrap().is_empty());

        *transport.picked.lock().unwrap() = true;
        store.dispatch(HistoryAction::NavigateForward);
        assert_eq!(transport.broadcast.lock().unwrap().len(), 1);
        assert_eq!(
            transport.directed.lock().unwrap().as_slice(),
            &[WireMessage::reset(Some(b"B".to_vec()))]
        );
    }

    #[test]
    fn test_broadcast_disabled_sends_nothing() {
        let transport = Arc::new(CountingBroadcaster::default());
        let mut store = HistoryStore::new(false).with_broadcaster(transport.clone());
        append(&mut store, "login", b"A");
        append(&mut store, "open", b"B");
        append(&mut store, "click", b"C");

        store.dispatch(HistoryAction::NavigateBack);
        store.dispatch(HistoryAction::NavigateBack);
        store.dispatch(HistoryAction::NavigateForward);
        store.dispatch(HistoryAction::DeleteSelected);
        store.dispatch(HistoryAction::RowSelected(2));

        assert_eq!(store.state().selection, Some(2));
        assert_eq!(store.state().len(), 2);
        assert_eq!(transport.sent.lock().unwrap().len(), 0);
    }

    #[test]
    fn test_replay_sink_sees_replays_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let mut store = HistoryStore::new(false).with_replay_sink(sink.clone());
        append(&mut store, "login", b"A");
        append(&mut store, "open", b"B");

        store.dispatch(HistoryAction::NavigateBack);
        store.dispatch(HistoryAction::DeleteSelected);

        let restored = sink.restored.lock().unwrap();
        assert_eq!(restored.as_slice(), &[Some(b"A".to_vec()), None]);
    }

    #[test]
    fn test_receive_drops_duplicates_from_same_peer() {
        let mut store = HistoryStore::default();
        let origin = Origin {
            peer: "peer-a".to_string(),
            sequence: 7,
        };

        assert!(store.receive(Some(origin.clone()), WireMessage::record("login", b"A".to_vec())));
        assert!(!store.receive(Some(origin), WireMessage::record("login", b"A".to_vec())));

        // same sequence from another peer is an independent stream
        let other = Origin {
            peer: "peer-b".to_string(),
            sequence: 7,
        };
        assert!(store.receive(Some(other), WireMessage::record("login", b"A".to_vec())));

        assert_eq!(store.state().len(), 2);
    }

    #[test]
    fn test_seen_sequences_window() {
        let mut seen = SeenSequences::default();
        assert!(seen.insert(5));
        assert!(!seen.insert(5));

        // out of order within the window
        assert!(seen.insert(9));
        assert!(seen.insert(7));
        assert!(!seen.insert(7));
        assert!(seen.insert(0));

        assert!(seen.insert(200));
        assert!(!seen.insert(9), "fell out of the window");
        assert!(seen.insert(200 - SEQUENCE_WINDOW + 1));
        assert!(!seen.insert(200));
    }

    #[test]
    fn test_receive_ignores_resets() {
        let mut store = HistoryStore::default();
        assert!(!store.receive(None, WireMessage::reset(Some(b"A".to_vec()))));
        assert!(store.state().is_empty());
    }

    #[test]
    fn test_receive_keeps_payload_bytes() {
        let mut store = HistoryStore::default();
        let payload: Vec<u8> = (0..=255).collect();
        store.receive(None, WireMessage::record("bytes", payload.clone()));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.selected().unwrap().resulting_state, Some(payload));
    }

    #[actix_rt::test]
    async fn test_actor_serializes_concurrent_appends() {
        let store = HistoryStore::default().start();

        let sends: Vec<_> = (0..50u8)
            .map(|i| {
                store.send(ReceiveTransition {
                    origin: Some(Origin {
                        peer: format!("peer-{}", i % 3),
                        sequence: i as u64,
                    }),
                    message: WireMessage::record(format!("action {}", i), vec![i]),
                })
            })
            .collect();
        for send in sends {
            assert!(send.await.unwrap());
        }

        let snapshot = store.send(GetHistory).await.unwrap();
        let indices: Vec<_> = snapshot.history.iter().map(|s| s.index).collect();
        assert_eq!(indices, (0..50).collect::<Vec<_>>());
        assert_eq!(snapshot.selection, Some(49));
    }

    #[actix_rt::test]
    async fn test_toggle_broadcast_through_actor() {
        let transport = Arc::new(CountingBroadcaster::default());
        let store = HistoryStore::new(false)
            .with_broadcaster(transport.clone())
            .start();

        store
            .send(Dispatch(HistoryAction::AppendTransition(
                "login".to_string(),
                Some(b"A".to_vec()),
            )))
            .await
            .unwrap();
        store.send(Dispatch(HistoryAction::RowSelected(0))).await.unwrap();
        assert_eq!(transport.sent.lock().unwrap().len(), 0);

        store.send(SetBroadcastEnabled(true)).await.unwrap();
        let outcome = store.send(Dispatch(HistoryAction::RowSelected(0))).await.unwrap();
        assert_eq!(outcome.effects.len(), 2);
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }
}
