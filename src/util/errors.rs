use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistorianError {
    /// Application state could not be encoded or decoded as a snapshot
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A wire frame could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// Discovery or channel encryption could not be set up
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<bincode::Error> for HistorianError {
    fn from(err: bincode::Error) -> Self {
        HistorianError::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for HistorianError {
    fn from(err: serde_json::Error) -> Self {
        HistorianError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for HistorianError {
    fn from(err: toml::de::Error) -> Self {
        HistorianError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HistorianError>;
