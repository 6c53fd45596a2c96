use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// What a peer should do with a [`Message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// A new transition to append to the history log
    Record,
    /// Restore exactly this state, bypassing the log
    Reset,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Record => write!(f, "record"),
            MessageKind::Reset => write!(f, "reset"),
        }
    }
}

/// Envelope carried between recorder and viewers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    /// Action label, empty for resets
    pub action: String,
    /// Serialized state. `None` means the application's initial state.
    pub state: Option<Vec<u8>>,
}

impl Message {
    pub fn record(action: impl Into<String>, state: Vec<u8>) -> Self {
        Self {
            kind: MessageKind::Record,
            action: action.into(),
            state: Some(state),
        }
    }

    pub fn reset(state: Option<Vec<u8>>) -> Self {
        Self {
            kind: MessageKind::Reset,
            action: String::new(),
            state,
        }
    }
}

/// A payload type that can travel over the transceiver.
///
/// The tag routes inbound frames to the handlers registered for this type.
pub trait WirePayload: Serialize + DeserializeOwned + Send + 'static {
    const TYPE_TAG: &'static str;
}

impl WirePayload for Message {
    const TYPE_TAG: &'static str = "historian/message";
}

/// Frame that actually goes over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// [`WirePayload::TYPE_TAG`] of the body
    pub tag: String,
    /// Per-sender counter, used to drop re-deliveries
    pub sequence: u64,
    /// bincode-encoded payload
    pub body: Vec<u8>,
}

/// Acknowledgement for directed sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Sequence of the envelope being acknowledged
    pub sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_has_empty_label() {
        let msg = Message::reset(Some(vec![1, 2]));
        assert_eq!(msg.kind, MessageKind::Reset);
        assert!(msg.action.is_empty());
        assert_eq!(msg.state, Some(vec![1, 2]));

        assert_eq!(Message::reset(None).state, None);
    }

    #[test]
    fn test_record_always_carries_state() {
        let msg = Message::record("login", b"{}".to_vec());
        assert_eq!(msg.kind, MessageKind::Record);
        assert_eq!(msg.action, "login");
        assert_eq!(msg.state.as_deref(), Some(&b"{}"[..]));
        assert_eq!(msg.kind.to_string(), "record");
    }
}
