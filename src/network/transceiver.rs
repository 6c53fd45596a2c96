use libp2p::PeerId;
use libp2p_identity::Keypair;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;

use super::codec;
use super::event_loop::{Command, EventLoop};
use super::messages::{Envelope, Message, WirePayload};
use super::peer_registry::{Peer, PeerRegistry};
use super::transport;
use crate::config::NetworkConfig;
use crate::util::errors::Result;

/// Anything that can fan a [`Message`] out to peers
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, message: &Message);

    /// Send only to the peers the user picked. Returns false when no
    /// subset is picked and nothing was sent.
    fn send_to_selected(&self, _message: &Message) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    Stopped,
    Running,
    /// Setup failed; the process keeps working without peers
    Unavailable(String),
}

/// Where an inbound payload came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: PeerId,
    pub sequence: u64,
}

type RawHandler = Arc<dyn Fn(&Envelope, &Delivery) + Send + Sync>;

/// Inbound handlers keyed by payload type tag
#[derive(Default)]
pub(crate) struct HandlerTable {
    handlers: RwLock<HashMap<String, Vec<RawHandler>>>,
}

impl HandlerTable {
    fn register(&self, tag: &str, handler: RawHandler) {
        write(&self.handlers)
            .entry(tag.to_string())
            .or_default()
            .push(handler);
    }

    /// Hand an envelope to every handler for its type. Returns how many ran.
    pub(crate) fn deliver(&self, envelope: &Envelope, delivery: &Delivery) -> usize {
        let handlers = match read(&self.handlers).get(&envelope.tag) {
            Some(handlers) => handlers.clone(),
            None => {
                tracing::debug!("No handler for '{}' from {}", envelope.tag, delivery.from);
                return 0;
            }
        };

        for handler in &handlers {
            handler(envelope, delivery);
        }
        handlers.len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    node_name: String,
    config: NetworkConfig,
    keypair: Keypair,
    local_peer_id: PeerId,
    peers: Arc<RwLock<PeerRegistry>>,
    handlers: Arc<HandlerTable>,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    status: RwLock<TransportStatus>,
    sequence: AtomicU64,
}

/// Peer discovery plus encrypted broadcast and directed send.
///
/// Cheap to clone; all clones share one swarm. Sends are fire-and-forget:
/// they return as soon as the frame is queued for the swarm task.
#[derive(Clone)]
pub struct Transceiver {
    inner: Arc<Inner>,
}

impl Transceiver {
    pub fn new(node_name: impl Into<String>, config: NetworkConfig) -> Self {
        let keypair = Keypair::generate_ed25519();
        let local_peer_id = keypair.public().to_peer_id();

        Self {
            inner: Arc::new(Inner {
                node_name: node_name.into(),
                config,
                keypair,
                local_peer_id,
                peers: Arc::new(RwLock::new(PeerRegistry::new())),
                handlers: Arc::new(HandlerTable::default()),
                commands: Mutex::new(None),
                status: RwLock::new(TransportStatus::Stopped),
                sequence: AtomicU64::new(0),
            }),
        }
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.inner.local_peer_id
    }

    pub fn node_name(&self) -> &str {
        &self.inner.node_name
    }

    pub fn status(&self) -> TransportStatus {
        read(&self.inner.status).clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.commands).is_some()
    }

    /// Begin advertising and browsing. Calling it again while running does
    /// nothing.
    ///
    /// Must be called from within a tokio runtime. A failed setup is not
    /// returned to the caller: the status becomes `Unavailable` and the
    /// peer list stays empty.
    pub fn start(&self) {
        let mut commands = lock(&self.inner.commands);
        if commands.is_some() {
            tracing::debug!("Transceiver already running");
            return;
        }

        match self.launch() {
            Ok(sender) => {
                *commands = Some(sender);
                *write(&self.inner.status) = TransportStatus::Running;
                tracing::info!(
                    "Transceiver started as {} ({})",
                    self.inner.node_name,
                    self.inner.local_peer_id
                );
            }
            Err(e) => {
                tracing::warn!("Transport unavailable, continuing without peers: {}", e);
                *write(&self.inner.status) = TransportStatus::Unavailable(e.to_string());
            }
        }
    }

    fn launch(&self) -> Result<mpsc::UnboundedSender<Command>> {
        let config = &self.inner.config;
        let mut swarm =
            transport::build_swarm(self.inner.keypair.clone(), config, &self.inner.node_name)?;
        transport::listen(&mut swarm, config)?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(
            swarm,
            receiver,
            config,
            self.inner.peers.clone(),
            self.inner.handlers.clone(),
        );
        tokio::spawn(event_loop.run());

        Ok(sender)
    }

    /// Tear down discovery and every open channel. Idempotent.
    pub fn stop(&self) {
        if let Some(sender) = lock(&self.inner.commands).take() {
            // The loop may already be gone; either way it is stopping
            let _ = sender.send(Command::Shutdown);
            tracing::info!("Transceiver stopped");
        }
        write(&self.inner.peers).clear();
        *write(&self.inner.status) = TransportStatus::Stopped;
    }

    /// Best-known peers and their connectivity
    pub fn available_peers(&self) -> Vec<Peer> {
        read(&self.inner.peers).snapshot()
    }

    /// Flip a peer in or out of the subset used by [`Self::send_to_selected`]
    pub fn toggle_peer(&self, peer_id: &PeerId) -> bool {
        write(&self.inner.peers).toggle_selected(peer_id)
    }

    pub fn selected_peers(&self) -> Vec<PeerId> {
        read(&self.inner.peers).selected_peers()
    }

    /// Register a handler called once per inbound payload of type `T`
    pub fn on_receive<T, F>(&self, handler: F)
    where
        T: WirePayload,
        F: Fn(T, Delivery) + Send + Sync + 'static,
    {
        let raw: RawHandler = Arc::new(move |envelope: &Envelope, delivery: &Delivery| {
            match codec::open::<T>(envelope) {
                Ok(payload) => handler(payload, delivery.clone()),
                Err(e) => tracing::warn!("Dropping malformed payload from {}: {}", delivery.from, e),
            }
        });
        self.inner.handlers.register(T::TYPE_TAG, raw);
    }

    /// Send to every connected peer
    pub fn broadcast<T: WirePayload>(&self, payload: &T) {
        if let Some(envelope) = self.seal(payload) {
            self.submit(Command::Publish(envelope));
        }
    }

    /// Send to a subset of peers
    pub fn send<T: WirePayload>(&self, payload: &T, peers: &[PeerId]) {
        if peers.is_empty() {
            return;
        }
        if let Some(envelope) = self.seal(payload) {
            self.submit(Command::Send {
                peers: peers.to_vec(),
                envelope,
            });
        }
    }

    /// Send to the selected subset. Returns false, sending nothing, when
    /// no peer is selected.
    pub fn send_to_selected<T: WirePayload>(&self, payload: &T) -> bool {
        let peers = self.selected_peers();
        if peers.is_empty() {
            return false;
        }
        self.send(payload, &peers);
        true
    }

    fn seal<T: WirePayload>(&self, payload: &T) -> Option<Envelope> {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed);
        match codec::seal(payload, sequence) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                tracing::warn!("Could not encode '{}' payload: {}", T::TYPE_TAG, e);
                None
            }
        }
    }

    fn submit(&self, command: Command) {
        match lock(&self.inner.commands).as_ref() {
            Some(sender) => {
                if sender.send(command).is_err() {
                    tracing::debug!("Transceiver loop has exited, dropping outbound frame");
                }
            }
            None => tracing::debug!("Transceiver not running, dropping outbound frame"),
        }
    }

    #[cfg(test)]
    pub(crate) fn handlers(&self) -> &HandlerTable {
        &self.inner.handlers
    }

    /// Capture outbound commands without a swarm
    #[cfg(test)]
    pub(crate) fn attach_commands(&self) -> mpsc::UnboundedReceiver<Command> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *lock(&self.inner.commands) = Some(sender);
        receiver
    }

    #[cfg(test)]
    pub(crate) fn peers(&self) -> &RwLock<PeerRegistry> {
        &self.inner.peers
    }
}

impl Broadcaster for Transceiver {
    fn broadcast(&self, message: &Message) {
        tracing::debug!("Broadcasting {} '{}'", message.kind, message.action);
        Transceiver::broadcast(self, message);
    }

    fn send_to_selected(&self, message: &Message) -> bool {
        let sent = Transceiver::send_to_selected(self, message);
        if sent {
            tracing::debug!("Sent {} to selected peers", message.kind);
        }
        sent
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(sender) = lock(&self.commands).take() {
            let _ = sender.send(Command::Shutdown);
        }
    }
}
