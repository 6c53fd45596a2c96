pub mod behaviour;
pub mod codec;
mod event_loop;
pub mod messages;
pub mod peer_registry;
pub mod transceiver;
pub mod transport;

pub use messages::{Message, MessageKind, WirePayload};
pub use peer_registry::{Peer, PeerRegistry};
pub use transceiver::{Broadcaster, Delivery, Transceiver, TransportStatus};
