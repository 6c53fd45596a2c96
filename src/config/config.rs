use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::util::errors::{HistorianError, Result};

/// Service identifier shared by every historian process
pub const DEFAULT_SERVICE_TYPE: &str = "historian";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Display name advertised to other peers
    #[serde(default = "default_node_name")]
    pub name: String,

    /// Default tracing filter, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_node_name() -> String {
    format!("historian-{}", std::process::id())
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Channel encryption requirement. Only `Required` is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionPreference {
    Required,
    Optional,
    None,
}

impl Default for EncryptionPreference {
    fn default() -> Self {
        EncryptionPreference::Required
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Peers only exchange messages under the same service type
    #[serde(default = "default_service_type")]
    pub service_type: String,

    #[serde(default)]
    pub encryption: EncryptionPreference,

    #[serde(default = "default_idle_connection_timeout_secs")]
    pub idle_connection_timeout_secs: u64,

    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

impl NetworkConfig {
    pub fn idle_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_connection_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Gossipsub topic carrying broadcasts for this service
    pub fn topic(&self) -> String {
        format!("{}/broadcast", self.service_type)
    }

    /// Protocol version announced over identify
    pub fn protocol_version(&self) -> String {
        format!("/{}/1.0.0", self.service_type)
    }

    pub fn validate(&self) -> Result<()> {
        if self.encryption != EncryptionPreference::Required {
            return Err(HistorianError::InvalidConfig(format!(
                "encryption must be 'required', got {:?}; state snapshots are never sent in clear text",
                self.encryption
            )));
        }

        if self.service_type.is_empty() {
            return Err(HistorianError::InvalidConfig(
                "service_type cannot be empty".to_string(),
            ));
        }

        if self.listen_addr.parse::<libp2p::Multiaddr>().is_err() {
            return Err(HistorianError::InvalidConfig(format!(
                "listen_addr '{}' is not a valid multiaddr",
                self.listen_addr
            )));
        }

        if self.heartbeat_interval_secs == 0 {
            return Err(HistorianError::InvalidConfig(
                "heartbeat_interval_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            service_type: default_service_type(),
            encryption: EncryptionPreference::Required,
            idle_connection_timeout_secs: default_idle_connection_timeout_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "/ip4/0.0.0.0/tcp/0".to_string()
}

fn default_service_type() -> String {
    DEFAULT_SERVICE_TYPE.to_string()
}

fn default_idle_connection_timeout_secs() -> u64 {
    60
}

fn default_heartbeat_interval_secs() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// When false, navigation does not send reset messages to peers.
    /// A store embedded in the recorder itself should turn this off.
    #[serde(default = "default_broadcast_enabled")]
    pub broadcast_enabled: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            broadcast_enabled: default_broadcast_enabled(),
        }
    }
}

fn default_broadcast_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node.name.trim().is_empty() {
            return Err(HistorianError::InvalidConfig(
                "node name cannot be empty".to_string(),
            ));
        }

        self.network.validate()
    }
}
