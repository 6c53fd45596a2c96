use libp2p::{noise, tcp, yamux, Swarm};
use libp2p_identity::Keypair;

use super::behaviour::HistorianBehaviour;
use crate::config::NetworkConfig;
use crate::util::errors::{HistorianError, Result};

/// Builds the swarm: TCP, noise for authentication and encryption, yamux
/// for multiplexing.
///
/// There is no plaintext path; a configuration asking for anything but
/// required encryption is refused before any socket is opened.
pub fn build_swarm(
    keypair: Keypair,
    config: &NetworkConfig,
    node_name: &str,
) -> Result<Swarm<HistorianBehaviour>> {
    config
        .validate()
        .map_err(|e| HistorianError::TransportUnavailable(e.to_string()))?;

    let swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(
            tcp::Config::default().nodelay(true),
            noise::Config::new,
            yamux::Config::default,
        )
        .map_err(|e| HistorianError::TransportUnavailable(format!("noise setup failed: {}", e)))?
        .with_behaviour(|key| HistorianBehaviour::new(key, config, node_name))
        .map_err(|e| HistorianError::TransportUnavailable(e.to_string()))?
        .with_swarm_config(|c| c.with_idle_connection_timeout(config.idle_connection_timeout()))
        .build();

    Ok(swarm)
}

/// Start listening and join the service topic
pub fn listen(swarm: &mut Swarm<HistorianBehaviour>, config: &NetworkConfig) -> Result<()> {
    let addr = config
        .listen_addr
        .parse()
        .map_err(|e| HistorianError::InvalidConfig(format!("listen_addr: {}", e)))?;

    swarm
        .listen_on(addr)
        .map_err(|e| HistorianError::TransportUnavailable(e.to_string()))?;

    let topic = libp2p::gossipsub::IdentTopic::new(config.topic());
    swarm
        .behaviour_mut()
        .gossipsub
        .subscribe(&topic)
        .map_err(|e| HistorianError::Transport(format!("subscribe failed: {:?}", e)))?;

    Ok(())
}
