use std::collections::HashMap;
use std::sync::Arc;

mod commands;
pub mod render;

pub use commands::{
    BackCommand, BroadcastCommand, ClearCommand, DeleteCommand, ForwardCommand, HelpCommand,
    ListCommand, PeerCommand, PeersCommand, QuitCommand, SelectCommand,
};

use crate::history::HistoryAction;

/// What the viewer should do after a command ran
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Send an action to the history store
    Dispatch(HistoryAction),
    ShowHistory,
    ShowPeers,
    /// Toggle a peer, by name or short id, in the directed-send subset
    TogglePeer(String),
    SetBroadcast(bool),
    Help,
    Quit,
    Error(String),
}

/// Trait for console commands - implement this to add new commands
pub trait CommandHandler: Send + Sync {
    /// Command name as typed, e.g. "back"
    fn name(&self) -> &str;

    fn execute(&self, args: Vec<String>) -> CommandResult;

    fn help(&self) -> String {
        format!("No help available for {}", self.name())
    }
}

/// Registry for managing command handlers
#[derive(Clone)]
pub struct CommandRegistry {
    handlers: Arc<HashMap<String, Arc<dyn CommandHandler>>>,
}

impl CommandRegistry {
    /// Create a new empty command registry
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(HashMap::new()),
        }
    }

    /// Create a registry with every viewer command
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ListCommand));
        registry.register(Arc::new(PeersCommand));
        registry.register(Arc::new(SelectCommand));
        registry.register(Arc::new(ClearCommand));
        registry.register(Arc::new(BackCommand));
        registry.register(Arc::new(ForwardCommand));
        registry.register(Arc::new(DeleteCommand));
        registry.register(Arc::new(BroadcastCommand));
        registry.register(Arc::new(PeerCommand));
        registry.register(Arc::new(HelpCommand));
        registry.register(Arc::new(QuitCommand));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        let handlers = Arc::make_mut(&mut self.handlers);
        handlers.insert(handler.name().to_string(), handler);
    }

    /// Execute a command by name with arguments
    pub fn execute(&self, command: &str, args: Vec<String>) -> Option<CommandResult> {
        self.handlers
            .get(command)
            .map(|handler| handler.execute(args))
    }

    pub fn get_help(&self, command: &str) -> Option<String> {
        self.handlers.get(command).map(|handler| handler.help())
    }

    /// All registered command names, sorted
    pub fn list_commands(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_command(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// One line of help per command
    pub fn usage(&self) -> String {
        self.list_commands()
            .iter()
            .filter_map(|name| self.get_help(name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Parse a command line into command name and arguments
/// Example: "select 3" -> ("select", vec!["3"])
pub fn parse_command(text: &str, prefix: &str) -> Option<(String, Vec<String>)> {
    let text = text.trim();

    let without_prefix = text.strip_prefix(prefix)?;
    let parts: Vec<&str> = without_prefix.split_whitespace().collect();

    if parts.is_empty() {
        return None;
    }

    let command = parts[0].to_lowercase();
    let args = parts[1..].iter().map(|s| s.to_string()).collect();

    Some((command, args))
}
