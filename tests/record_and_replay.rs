use actix::prelude::*;
use historian::history::{
    Dispatch, Effect, GetHistory, HistoryAction, HistoryStore, Origin, ReceiveTransition,
    SetBroadcastEnabled,
};
use historian::network::messages::Envelope;
use historian::network::{codec, Broadcaster, Message, MessageKind};
use historian::recorder::{decode_state, encode_state, Describe, HistorySink, Recorder, Reducer, ReplaySink};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Session {
    user: Option<String>,
    page: String,
    clicks: u32,
}

enum SessionAction {
    Login(&'static str),
    Open(&'static str),
    Click,
}

impl Describe for SessionAction {
    fn describe(&self) -> String {
        match self {
            SessionAction::Login(_) => "login".to_string(),
            SessionAction::Open(_) => "open".to_string(),
            SessionAction::Click => "click".to_string(),
        }
    }
}

struct SessionReducer;

impl Reducer for SessionReducer {
    type State = Session;
    type Action = SessionAction;
    type Effect = ();

    fn reduce(&self, state: &mut Session, action: SessionAction) -> Vec<()> {
        match action {
            SessionAction::Login(user) => state.user = Some(user.to_string()),
            SessionAction::Open(page) => state.page = page.to_string(),
            SessionAction::Click => state.clicks += 1,
        }
        vec![]
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<Message>>,
}

impl Outbox {
    fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

impl Broadcaster for Outbox {
    fn broadcast(&self, message: &Message) {
        self.sent.lock().unwrap().push(message.clone());
    }
}

/// Drive login, open, click through a recorder feeding `store`
fn record_session(history: Arc<dyn HistorySink>) -> Vec<Session> {
    let recorder = Recorder::new(SessionReducer).with_history(history);
    let mut session = Session::default();
    let mut states = Vec::new();

    for action in [
        SessionAction::Login("ada"),
        SessionAction::Open("inbox"),
        SessionAction::Click,
    ] {
        recorder.reduce(&mut session, action);
        states.push(session.clone());
    }
    states
}

#[actix_rt::test]
async fn recorded_transitions_land_in_the_store() {
    let store = HistoryStore::new(false).start();
    let states = record_session(Arc::new(store.clone()));

    let snapshot = store.send(GetHistory).await.unwrap();
    let labels: Vec<_> = snapshot.history.iter().map(|s| s.action.as_str()).collect();
    assert_eq!(labels, ["login", "open", "click"]);
    assert_eq!(
        snapshot.history.iter().map(|s| s.index).collect::<Vec<_>>(),
        [0, 1, 2]
    );
    assert_eq!(snapshot.selection, Some(2));

    for (step, state) in snapshot.history.iter().zip(&states) {
        assert_eq!(step.resulting_state, Some(encode_state(state).unwrap()));
    }
}

#[actix_rt::test]
async fn navigation_replays_into_the_application() {
    let restored: Arc<Mutex<Vec<Session>>> = Arc::default();
    let sink_target = restored.clone();
    let sink: Arc<dyn ReplaySink> = Arc::new(move |data: Option<Vec<u8>>| {
        let session: Session = decode_state(data.as_deref()).unwrap();
        sink_target.lock().unwrap().push(session);
    });

    let outbox = Arc::new(Outbox::default());
    let store = HistoryStore::new(false)
        .with_broadcaster(outbox.clone())
        .with_replay_sink(sink)
        .start();
    let states = record_session(Arc::new(store.clone()));

    store.send(Dispatch(HistoryAction::NavigateBack)).await.unwrap();
    store.send(Dispatch(HistoryAction::NavigateBack)).await.unwrap();
    let outcome = store.send(Dispatch(HistoryAction::DeleteSelected)).await.unwrap();
    assert_eq!(outcome.effects, vec![Effect::Replay(None)]);

    let snapshot = store.send(GetHistory).await.unwrap();
    assert_eq!(
        snapshot.history.iter().map(|s| s.index).collect::<Vec<_>>(),
        [1, 2]
    );
    assert_eq!(snapshot.selection, None);

    // open, then login, then the initial state after deleting login
    assert_eq!(
        *restored.lock().unwrap(),
        vec![states[1].clone(), states[0].clone(), Session::default()]
    );
    assert!(outbox.sent().is_empty(), "broadcast was disabled");
}

#[actix_rt::test]
async fn enabled_broadcast_sends_resets() {
    let outbox = Arc::new(Outbox::default());
    let store = HistoryStore::new(false).with_broadcaster(outbox.clone()).start();
    let states = record_session(Arc::new(store.clone()));

    store.send(SetBroadcastEnabled(true)).await.unwrap();
    store.send(Dispatch(HistoryAction::RowSelected(0))).await.unwrap();

    let sent = outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, MessageKind::Reset);
    assert_eq!(sent[0].state, Some(encode_state(&states[0]).unwrap()));
}

#[actix_rt::test]
async fn wire_round_trip_preserves_state_bytes() {
    let state = encode_state(&Session {
        user: Some("ada".to_string()),
        page: "inbox".to_string(),
        clicks: 7,
    })
    .unwrap();

    let envelope = codec::seal(&Message::record("click", state.clone()), 41).unwrap();
    let frame = codec::encode(&envelope).unwrap();
    let received: Envelope = codec::decode(&frame).unwrap();
    let message: Message = codec::open(&received).unwrap();

    let store = HistoryStore::new(false).start();
    let origin = Origin {
        peer: "recorder".to_string(),
        sequence: received.sequence,
    };

    for _ in 0..2 {
        store
            .send(ReceiveTransition {
                origin: Some(origin.clone()),
                message: message.clone(),
            })
            .await
            .unwrap();
    }

    let snapshot = store.send(GetHistory).await.unwrap();
    assert_eq!(snapshot.history.len(), 1, "re-delivery is appended once");
    assert_eq!(snapshot.history[0].resulting_state, Some(state));
}
