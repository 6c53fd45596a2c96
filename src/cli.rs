use clap::Args;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::util::errors::Result;

/// Flags shared by the viewer and the demo recorder
#[derive(Debug, Clone, Default, Args)]
pub struct NodeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Name shown to peers
    #[arg(short, long)]
    pub name: Option<String>,

    /// Multiaddr to listen on
    #[arg(long)]
    pub listen: Option<String>,

    /// Service type; only peers on the same service see each other
    #[arg(long)]
    pub service: Option<String>,

    /// Broadcast history replays to peers
    #[arg(long, conflicts_with = "no_broadcast")]
    pub broadcast: bool,

    /// Keep history replays local
    #[arg(long)]
    pub no_broadcast: bool,
}

impl NodeArgs {
    /// Load the config file (or defaults) and apply command line overrides
    pub fn resolve(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(name) = &self.name {
            config.node.name = name.clone();
        }
        if let Some(listen) = &self.listen {
            config.network.listen_addr = listen.clone();
        }
        if let Some(service) = &self.service {
            config.network.service_type = service.clone();
        }
        if self.broadcast {
            config.history.broadcast_enabled = true;
        }
        if self.no_broadcast {
            config.history.broadcast_enabled = false;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[node]\nname = \"from-file\"\n\n[history]\nbroadcast_enabled = true"
        )
        .unwrap();

        let args = NodeArgs {
            config: Some(file.path().to_path_buf()),
            name: Some("from-flag".to_string()),
            no_broadcast: true,
            ..Default::default()
        };

        let config = args.resolve().unwrap();
        assert_eq!(config.node.name, "from-flag");
        assert!(!config.history.broadcast_enabled);
    }

    #[test]
    fn test_viewer_broadcasts_replays_by_default() {
        let config = NodeArgs::default().resolve().unwrap();
        assert!(config.history.broadcast_enabled);
    }

    #[test]
    fn test_bad_listen_addr_rejected() {
        let args = NodeArgs {
            listen: Some("not a multiaddr".to_string()),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }
}
