pub mod config;

pub use config::{Config, EncryptionPreference, HistoryConfig, NetworkConfig, NodeConfig};
