use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use libp2p::{
    gossipsub::{self, MessageAuthenticity},
    identify, mdns,
    request_response::{self, ProtocolSupport},
    swarm::NetworkBehaviour,
    StreamProtocol,
};
use libp2p_identity::Keypair;
use std::io;

use super::codec::{EnvelopeCodec, DIRECT_PROTOCOL, MAX_MESSAGE_SIZE};
use crate::config::NetworkConfig;

/// Discovery, broadcast and directed delivery combined
#[derive(NetworkBehaviour)]
pub struct HistorianBehaviour {
    pub gossipsub: gossipsub::Behaviour,
    pub mdns: mdns::tokio::Behaviour,
    pub identify: identify::Behaviour,
    pub direct: request_response::Behaviour<EnvelopeCodec>,
}

impl HistorianBehaviour {
    pub fn new(
        key: &Keypair,
        config: &NetworkConfig,
        node_name: &str,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        // Identical payloads from the same author are the same message
        let message_id_fn = |message: &gossipsub::Message| {
            let mut s = DefaultHasher::new();
            message.source.hash(&mut s);
            message.data.hash(&mut s);
            gossipsub::MessageId::from(s.finish().to_string())
        };

        let gossipsub_config = gossipsub::ConfigBuilder::default()
            .heartbeat_interval(config.heartbeat_interval())
            .validation_mode(gossipsub::ValidationMode::Strict)
            .message_id_fn(message_id_fn)
            .max_transmit_size(MAX_MESSAGE_SIZE)
            .build()
            .map_err(|msg| io::Error::new(io::ErrorKind::Other, msg.to_string()))?;

        let gossipsub =
            gossipsub::Behaviour::new(MessageAuthenticity::Signed(key.clone()), gossipsub_config)?;

        let mdns = mdns::tokio::Behaviour::new(mdns::Config::default(), key.public().to_peer_id())?;

        let identify = identify::Behaviour::new(
            identify::Config::new(config.protocol_version(), key.public())
                .with_agent_version(node_name.to_string()),
        );

        let direct = request_response::Behaviour::with_codec(
            EnvelopeCodec,
            [(StreamProtocol::new(DIRECT_PROTOCOL), ProtocolSupport::Full)],
            request_response::Config::default(),
        );

        Ok(HistorianBehaviour {
            gossipsub,
            mdns,
            identify,
            direct,
        })
    }
}
