use actix::prelude::*;
use anyhow::Result;
use clap::Parser;
use historian::{
    cli::{init_tracing, NodeArgs},
    console::{parse_command, render, CommandRegistry, CommandResult},
    history::{Dispatch, Effect, GetHistory, HistoryStore, Origin, ReceiveTransition, SetBroadcastEnabled},
    network::{Message, MessageKind, Transceiver, TransportStatus},
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Collect state transitions from recorders on the local network and
/// replay any of them on demand
#[derive(Debug, Parser)]
#[command(name = "historian", version, about)]
struct Cli {
    #[command(flatten)]
    node: NodeArgs,
}

#[actix_rt::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.node.resolve()?;
    init_tracing(&config.node.log_level);

    tracing::info!("🕰️  Starting historian viewer {}", config.node.name);

    let transceiver = Transceiver::new(config.node.name.clone(), config.network.clone());
    let store = HistoryStore::new(config.history.broadcast_enabled)
        .with_broadcaster(Arc::new(transceiver.clone()))
        .start();

    let inbound = store.clone();
    transceiver.on_receive::<Message, _>(move |message, delivery| {
        if message.kind != MessageKind::Record {
            return;
        }
        tracing::debug!("Transition '{}' from {}", message.action, delivery.from);
        inbound.do_send(ReceiveTransition {
            origin: Some(Origin {
                peer: delivery.from.to_string(),
                sequence: delivery.sequence,
            }),
            message,
        });
    });

    transceiver.start();
    match transceiver.status() {
        TransportStatus::Unavailable(reason) => println!("⚠️  Running without peers: {}", reason),
        _ => println!("Peer id {}", transceiver.local_peer_id()),
    }

    let registry = CommandRegistry::with_defaults();
    println!("Type 'help' for commands.");
    run_console(&store, &transceiver, &registry).await?;

    tracing::info!("👋 Shutting down...");
    transceiver.stop();
    System::current().stop();
    Ok(())
}

async fn run_console(
    store: &Addr<HistoryStore>,
    transceiver: &Transceiver,
    registry: &CommandRegistry,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let Some((command, args)) = parse_command(&line, "") else {
            continue;
        };

        let result = match registry.execute(&command, args) {
            Some(result) => result,
            None => {
                println!("❌ Unknown command: {}", command);
                continue;
            }
        };

        match result {
            CommandResult::Dispatch(action) => {
                let outcome = store.send(Dispatch(action)).await?;
                for effect in &outcome.effects {
                    match effect {
                        Effect::Replay(Some(data)) => println!("↺ replaying {} bytes", data.len()),
                        Effect::Replay(None) => println!("↺ replaying initial state"),
                        Effect::Broadcast(_) => println!("📡 reset sent to peers"),
                    }
                }
                print_history(store).await?;
            }
            CommandResult::ShowHistory => print_history(store).await?,
            CommandResult::ShowPeers => {
                let selected = transceiver.selected_peers();
                for line in render::peer_lines(&transceiver.available_peers(), &selected) {
                    println!("{}", line);
                }
            }
            CommandResult::TogglePeer(needle) => {
                let peers = transceiver.available_peers();
                match render::find_peer(&peers, &needle) {
                    Some(peer) => {
                        let selected = transceiver.toggle_peer(&peer.id);
                        println!("{} {}", if selected { "✓" } else { "✗" }, peer.name);
                        if transceiver.selected_peers().is_empty() {
                            println!("No peers picked, resets go to everyone");
                        }
                    }
                    None => println!("❌ No peer named {}", needle),
                }
            }
            CommandResult::SetBroadcast(enabled) => {
                store.send(SetBroadcastEnabled(enabled)).await?;
                println!("Broadcast {}", if enabled { "on" } else { "off" });
            }
            CommandResult::Help => println!("{}", registry.usage()),
            CommandResult::Error(err) => println!("❌ {}", err),
            CommandResult::Quit => break,
        }
    }

    Ok(())
}

async fn print_history(store: &Addr<HistoryStore>) -> Result<()> {
    let snapshot = store.send(GetHistory).await?;
    for line in render::history_lines(&snapshot) {
        println!("{}", line);
    }
    Ok(())
}
