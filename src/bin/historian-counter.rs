use anyhow::Result;
use clap::Parser;
use historian::{
    cli::{init_tracing, NodeArgs},
    console::parse_command,
    recorder::{decode_state, subscribe_resets, Describe, Recorder, Reducer},
    network::Transceiver,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// A tiny counter whose every change is recorded to historian viewers
#[derive(Debug, Parser)]
#[command(name = "historian-counter", version, about)]
struct Cli {
    #[command(flatten)]
    node: NodeArgs,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Counter {
    count: i64,
    changes: u64,
}

#[derive(Debug, Clone, Copy)]
enum CounterAction {
    Increment,
    Decrement,
    Add(i64),
}

impl Describe for CounterAction {
    fn describe(&self) -> String {
        match self {
            CounterAction::Increment => "increment".to_string(),
            CounterAction::Decrement => "decrement".to_string(),
            CounterAction::Add(n) => format!("add({})", n),
        }
    }
}

#[derive(Debug)]
enum CounterEffect {
    Milestone(i64),
}

struct CounterReducer;

impl Reducer for CounterReducer {
    type State = Counter;
    type Action = CounterAction;
    type Effect = CounterEffect;

    fn reduce(&self, state: &mut Counter, action: CounterAction) -> Vec<CounterEffect> {
        state.count = match action {
            CounterAction::Increment => state.count.saturating_add(1),
            CounterAction::Decrement => state.count.saturating_sub(1),
            CounterAction::Add(n) => state.count.saturating_add(n),
        };
        state.changes += 1;

        if state.count != 0 && state.count % 10 == 0 {
            vec![CounterEffect::Milestone(state.count)]
        } else {
            vec![]
        }
    }
}

fn parse_action(command: &str, args: &[String]) -> Option<CounterAction> {
    match command {
        "inc" => Some(CounterAction::Increment),
        "dec" => Some(CounterAction::Decrement),
        "add" => args.first()?.parse().ok().map(CounterAction::Add),
        _ => None,
    }
}

#[actix_rt::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.node.resolve()?;
    init_tracing(&config.node.log_level);

    let transceiver = Transceiver::new(config.node.name.clone(), config.network.clone());
    let recorder = Recorder::new(CounterReducer).with_broadcaster(Arc::new(transceiver.clone()));

    let mut resets = subscribe_resets(&transceiver);
    transceiver.start();

    tracing::info!("🔢 Counter {} ready: inc, dec, add <n>, show, quit", config.node.name);

    let mut counter = Counter::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some((command, args)) = parse_command(&line, "") else { continue };

                match command.as_str() {
                    "show" => println!("count = {}", counter.count),
                    "quit" => break,
                    _ => match parse_action(&command, &args) {
                        Some(action) => {
                            for effect in recorder.reduce(&mut counter, action) {
                                let CounterEffect::Milestone(n) = effect;
                                println!("🎉 reached {}", n);
                            }
                            println!("count = {}", counter.count);
                        }
                        None => println!("❌ Unknown command: {}", line.trim()),
                    },
                }
            }
            Some(state) = resets.recv() => {
                match decode_state::<Counter>(state.as_deref()) {
                    Ok(restored) => {
                        counter = restored;
                        println!("↺ restored count = {}", counter.count);
                    }
                    Err(e) => tracing::warn!("Ignoring reset with unreadable state: {}", e),
                }
            }
        }
    }

    transceiver.stop();
    Ok(())
}
