use futures::StreamExt;
use libp2p::{
    gossipsub, identify, mdns, request_response,
    swarm::{dial_opts::DialOpts, SwarmEvent},
    Multiaddr, PeerId, Swarm,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use super::behaviour::{HistorianBehaviour, HistorianBehaviourEvent};
use super::codec;
use super::messages::{Ack, Envelope};
use super::peer_registry::PeerRegistry;
use super::transceiver::{read, write, Delivery, HandlerTable};
use crate::config::NetworkConfig;

/// Requests from [`super::Transceiver`] handles to the swarm task
#[derive(Debug)]
pub(crate) enum Command {
    Publish(Envelope),
    Send { peers: Vec<PeerId>, envelope: Envelope },
    Shutdown,
}

/// Owns the swarm and drives it until shut down
pub(crate) struct EventLoop {
    swarm: Swarm<HistorianBehaviour>,
    commands: mpsc::UnboundedReceiver<Command>,
    topic: gossipsub::IdentTopic,
    protocol_version: String,
    peers: Arc<RwLock<PeerRegistry>>,
    handlers: Arc<HandlerTable>,
}

impl EventLoop {
    pub(crate) fn new(
        swarm: Swarm<HistorianBehaviour>,
        commands: mpsc::UnboundedReceiver<Command>,
        config: &NetworkConfig,
        peers: Arc<RwLock<PeerRegistry>>,
        handlers: Arc<HandlerTable>,
    ) -> Self {
        Self {
            swarm,
            commands,
            topic: gossipsub::IdentTopic::new(config.topic()),
            protocol_version: config.protocol_version(),
            peers,
            handlers,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                event = self.swarm.select_next_some() => self.handle_event(event),
            }
        }

        tracing::debug!("Swarm event loop exited");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Publish(envelope) => {
                let bytes = match codec::encode(&envelope) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!("Could not encode broadcast: {}", e);
                        return;
                    }
                };

                if let Err(e) = self
                    .swarm
                    .behaviour_mut()
                    .gossipsub
                    .publish(self.topic.clone(), bytes)
                {
                    // No peers yet, or a duplicate; broadcasts are not retried
                    tracing::debug!("Broadcast {} dropped: {:?}", envelope.sequence, e);
                }
            }
            Command::Send { peers, envelope } => {
                for peer in peers {
                    if !self.swarm.is_connected(&peer) {
                        tracing::debug!("Skipping send to disconnected peer {}", peer);
                        continue;
                    }
                    self.swarm
                        .behaviour_mut()
                        .direct
                        .send_request(&peer, envelope.clone());
                }
            }
            Command::Shutdown => {}
        }
    }

    fn handle_event(&mut self, event: SwarmEvent<HistorianBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                tracing::info!("Listening on {}", address);
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                tracing::debug!("Connected to {}", peer_id);
                write(&self.peers).connected(peer_id);
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                num_established,
                ..
            } => {
                if num_established == 0 {
                    tracing::debug!("Disconnected from {}", peer_id);
                    write(&self.peers).disconnected(&peer_id);
                }
            }
            SwarmEvent::Behaviour(HistorianBehaviourEvent::Mdns(event)) => self.handle_mdns(event),
            SwarmEvent::Behaviour(HistorianBehaviourEvent::Identify(event)) => {
                self.handle_identify(event)
            }
            SwarmEvent::Behaviour(HistorianBehaviourEvent::Gossipsub(event)) => {
                self.handle_gossipsub(event)
            }
            SwarmEvent::Behaviour(HistorianBehaviourEvent::Direct(event)) => self.handle_direct(event),
            _ => {}
        }
    }

    fn handle_mdns(&mut self, event: mdns::Event) {
        match event {
            mdns::Event::Discovered(list) => {
                let mut addresses: HashMap<PeerId, Vec<Multiaddr>> = HashMap::new();
                for (peer_id, addr) in list {
                    addresses.entry(peer_id).or_default().push(addr);
                }

                for (peer_id, addrs) in addresses {
                    if write(&self.peers).discovered(peer_id) {
                        tracing::info!("Discovered peer {}", peer_id);
                    }
                    self.swarm
                        .behaviour_mut()
                        .gossipsub
                        .add_explicit_peer(&peer_id);

                    if !self.swarm.is_connected(&peer_id) {
                        let opts = DialOpts::peer_id(peer_id).addresses(addrs).build();
                        if let Err(e) = self.swarm.dial(opts) {
                            tracing::debug!("Dial to {} failed: {}", peer_id, e);
                        }
                    }
                }
            }
            mdns::Event::Expired(list) => {
                for (peer_id, _) in list {
                    write(&self.peers).expired(&peer_id);
                    if !self.swarm.is_connected(&peer_id) {
                        self.swarm
                            .behaviour_mut()
                            .gossipsub
                            .remove_explicit_peer(&peer_id);
                    }
                }
            }
        }
    }

    fn handle_identify(&mut self, event: identify::Event) {
        if let identify::Event::Received { peer_id, info, .. } = event {
            let compatible = info.protocol_version == self.protocol_version;
            if !compatible {
                tracing::debug!(
                    "Peer {} speaks {}, not {}",
                    peer_id,
                    info.protocol_version,
                    self.protocol_version
                );
                self.swarm
                    .behaviour_mut()
                    .gossipsub
                    .remove_explicit_peer(&peer_id);
            }
            write(&self.peers).identified(peer_id, info.agent_version, compatible);
        }
    }

    fn handle_gossipsub(&mut self, event: gossipsub::Event) {
        if let gossipsub::Event::Message {
            propagation_source,
            message,
            ..
        } = event
        {
            let from = message.source.unwrap_or(propagation_source);
            match codec::decode::<Envelope>(&message.data) {
                Ok(envelope) => self.deliver(from, envelope),
                Err(e) => tracing::warn!("Dropping undecodable broadcast from {}: {}", from, e),
            }
        }
    }

    fn handle_direct(&mut self, event: request_response::Event<Envelope, Ack>) {
        match event {
            request_response::Event::Message { peer, message, .. } => match message {
                request_response::Message::Request {
                    request, channel, ..
                } => {
                    let ack = Ack {
                        sequence: request.sequence,
                    };
                    self.deliver(peer, request);
                    if self
                        .swarm
                        .behaviour_mut()
                        .direct
                        .send_response(channel, ack)
                        .is_err()
                    {
                        tracing::debug!("Could not acknowledge send from {}", peer);
                    }
                }
                request_response::Message::Response { response, .. } => {
                    tracing::debug!("{} acknowledged {}", peer, response.sequence);
                }
            },
            request_response::Event::OutboundFailure { peer, error, .. } => {
                tracing::debug!("Send to {} failed: {}", peer, error);
            }
            request_response::Event::InboundFailure { peer, error, .. } => {
                tracing::debug!("Receive from {} failed: {}", peer, error);
            }
            request_response::Event::ResponseSent { .. } => {}
        }
    }

    fn deliver(&self, from: PeerId, envelope: Envelope) {
        if !read(&self.peers).is_compatible(&from) {
            tracing::debug!("Ignoring frame from {} on another service", from);
            return;
        }

        let delivery = Delivery {
            from,
            sequence: envelope.sequence,
        };
        tracing::debug!("Received '{}' {} from {}", envelope.tag, delivery.sequence, from);
        self.handlers.deliver(&envelope, &delivery);
    }
}
