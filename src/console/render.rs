use crate::history::HistorySnapshot;
use crate::network::peer_registry::{short_id, Peer};

/// History rows, newest first, with the selection marked
pub fn history_lines(snapshot: &HistorySnapshot) -> Vec<String> {
    if snapshot.history.is_empty() {
        return vec!["(no steps recorded)".to_string()];
    }

    snapshot
        .history
        .iter()
        .rev()
        .map(|step| {
            let marker = if Some(step.index) == snapshot.selection { '>' } else { ' ' };
            let size = if step.is_initial() {
                "initial".to_string()
            } else {
                format!("{} bytes", step.resulting_state.as_ref().map_or(0, Vec::len))
            };
            format!("{} {:>4}  {}  ({})", marker, step.index, step.action, size)
        })
        .collect()
}

/// Peer rows with a connectivity dot
pub fn peer_lines(peers: &[Peer], selected: &[libp2p::PeerId]) -> Vec<String> {
    if peers.is_empty() {
        return vec!["(no peers)".to_string()];
    }

    peers
        .iter()
        .map(|peer| {
            let dot = if peer.is_connected { '●' } else { '○' };
            let check = if selected.contains(&peer.id) { " ✓" } else { "" };
            format!("{} {} [{}]{}", dot, peer.name, short_id(&peer.id), check)
        })
        .collect()
}

/// Find a peer by display name or short id
pub fn find_peer<'a>(peers: &'a [Peer], needle: &str) -> Option<&'a Peer> {
    peers
        .iter()
        .find(|p| p.name == needle || short_id(&p.id) == needle || p.id.to_base58() == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Step;
    use libp2p::PeerId;

    #[test]
    fn test_history_lines_newest_first() {
        let snapshot = HistorySnapshot {
            history: vec![
                Step::new(0, "login", Some(vec![0; 3])),
                Step::new(1, "open", Some(vec![0; 5])),
            ],
            selection: Some(0),
            broadcast_enabled: false,
        };

        let lines = history_lines(&snapshot);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(' '));
        assert!(lines[0].contains("open"));
        assert!(lines[1].starts_with('>'));
        assert!(lines[1].contains("3 bytes"));
    }

    #[test]
    fn test_history_lines_label_initial_state() {
        let snapshot = HistorySnapshot {
            history: vec![Step::new(0, "reset", None)],
            selection: None,
            broadcast_enabled: true,
        };
        assert!(history_lines(&snapshot)[0].ends_with("(initial)"));
    }

    #[test]
    fn test_find_peer_by_name_or_id() {
        let id = PeerId::random();
        let peers = vec![Peer {
            id,
            name: "laptop".to_string(),
            is_connected: true,
        }];

        assert_eq!(find_peer(&peers, "laptop").map(|p| p.id), Some(id));
        assert_eq!(find_peer(&peers, &short_id(&id)).map(|p| p.id), Some(id));
        assert!(find_peer(&peers, "phone").is_none());

        let lines = peer_lines(&peers, &[id]);
        assert!(lines[0].starts_with('●'));
        assert!(lines[0].ends_with('✓'));
    }
}
