use super::{CommandHandler, CommandResult};
use crate::history::HistoryAction;

/// Show the history log, newest first
pub struct ListCommand;

impl CommandHandler for ListCommand {
    fn name(&self) -> &str {
        "list"
    }

    fn execute(&self, _args: Vec<String>) -> CommandResult {
        CommandResult::ShowHistory
    }

    fn help(&self) -> String {
        "list              show recorded steps, newest first".to_string()
    }
}

pub struct PeersCommand;

impl CommandHandler for PeersCommand {
    fn name(&self) -> &str {
        "peers"
    }

    fn execute(&self, _args: Vec<String>) -> CommandResult {
        CommandResult::ShowPeers
    }

    fn help(&self) -> String {
        "peers             show discovered peers and their connectivity".to_string()
    }
}

/// Select a step by index and replay it
pub struct SelectCommand;

impl CommandHandler for SelectCommand {
    fn name(&self) -> &str {
        "select"
    }

    fn execute(&self, args: Vec<String>) -> CommandResult {
        match args.first().map(|a| a.parse::<u64>()) {
            Some(Ok(index)) => CommandResult::Dispatch(HistoryAction::RowSelected(index)),
            Some(Err(_)) => CommandResult::Error(format!("Not a step index: {}", args[0])),
            None => CommandResult::Error("Usage: select <index>".to_string()),
        }
    }

    fn help(&self) -> String {
        "select <index>    select a step and replay its state".to_string()
    }
}

pub struct ClearCommand;

impl CommandHandler for ClearCommand {
    fn name(&self) -> &str {
        "clear"
    }

    fn execute(&self, _args: Vec<String>) -> CommandResult {
        CommandResult::Dispatch(HistoryAction::SelectStep(None))
    }

    fn help(&self) -> String {
        "clear             clear the selection".to_string()
    }
}

pub struct BackCommand;

impl CommandHandler for BackCommand {
    fn name(&self) -> &str {
        "back"
    }

    fn execute(&self, _args: Vec<String>) -> CommandResult {
        CommandResult::Dispatch(HistoryAction::NavigateBack)
    }

    fn help(&self) -> String {
        "back              step to the previous entry and replay it".to_string()
    }
}

pub struct ForwardCommand;

impl CommandHandler for ForwardCommand {
    fn name(&self) -> &str {
        "forward"
    }

    fn execute(&self, _args: Vec<String>) -> CommandResult {
        CommandResult::Dispatch(HistoryAction::NavigateForward)
    }

    fn help(&self) -> String {
        "forward           step to the next entry and replay it".to_string()
    }
}

pub struct DeleteCommand;

impl CommandHandler for DeleteCommand {
    fn name(&self) -> &str {
        "delete"
    }

    fn execute(&self, _args: Vec<String>) -> CommandResult {
        CommandResult::Dispatch(HistoryAction::DeleteSelected)
    }

    fn help(&self) -> String {
        "delete            remove the selected entry and replay its predecessor".to_string()
    }
}

/// Turn replay broadcasts on or off
pub struct BroadcastCommand;

impl CommandHandler for BroadcastCommand {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn execute(&self, args: Vec<String>) -> CommandResult {
        match args.first().map(|a| a.as_str()) {
            Some("on") => CommandResult::SetBroadcast(true),
            Some("off") => CommandResult::SetBroadcast(false),
            _ => CommandResult::Error("Usage: broadcast on|off".to_string()),
        }
    }

    fn help(&self) -> String {
        "broadcast on|off  send replays to peers or keep them local".to_string()
    }
}

pub struct PeerCommand;

impl CommandHandler for PeerCommand {
    fn name(&self) -> &str {
        "peer"
    }

    fn execute(&self, args: Vec<String>) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Error("Usage: peer <name|id>".to_string());
        }
        CommandResult::TogglePeer(args.join(" "))
    }

    fn help(&self) -> String {
        "peer <name|id>    pick which peers receive resets (default: all)".to_string()
    }
}

pub struct HelpCommand;

impl CommandHandler for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn execute(&self, _args: Vec<String>) -> CommandResult {
        CommandResult::Help
    }

    fn help(&self) -> String {
        "help              show this help".to_string()
    }
}

pub struct QuitCommand;

impl CommandHandler for QuitCommand {
    fn name(&self) -> &str {
        "quit"
    }

    fn execute(&self, _args: Vec<String>) -> CommandResult {
        CommandResult::Quit
    }

    fn help(&self) -> String {
        "quit              stop the viewer".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_parses_index() {
        assert_eq!(
            SelectCommand.execute(vec!["4".to_string()]),
            CommandResult::Dispatch(HistoryAction::RowSelected(4))
        );
        assert!(matches!(
            SelectCommand.execute(vec!["four".to_string()]),
            CommandResult::Error(_)
        ));
        assert!(matches!(SelectCommand.execute(vec![]), CommandResult::Error(_)));
    }

    #[test]
    fn test_broadcast_toggle() {
        assert_eq!(
            BroadcastCommand.execute(vec!["on".to_string()]),
            CommandResult::SetBroadcast(true)
        );
        assert_eq!(
            BroadcastCommand.execute(vec!["off".to_string()]),
            CommandResult::SetBroadcast(false)
        );
        assert!(matches!(
            BroadcastCommand.execute(vec!["maybe".to_string()]),
            CommandResult::Error(_)
        ));
    }

    #[test]
    fn test_peer_joins_name_words() {
        assert_eq!(
            PeerCommand.execute(vec!["living".to_string(), "room".to_string()]),
            CommandResult::TogglePeer("living room".to_string())
        );
    }
}
