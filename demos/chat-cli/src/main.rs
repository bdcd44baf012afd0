//! Line-oriented chat front end for a single flow.
//!
//! Run with: cargo run -p chat-cli -- path/to/flow.json
//!
//! Type a message and press enter to send it. `/clear` erases the
//! conversation, `/quit` closes the dialog. Start `echo-peer` first for a
//! local peer.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use flowchat_core::{Alert, FlowGraph, HistoryEvent, MessageEntry, Origin};
use flowchat_session::{ChannelNotifier, ChatConfig, DialogHost, FlowInfo, SendError, SessionController};
use futures::StreamExt;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Exported flow file: metadata plus the editor graph under `data`.
#[derive(Deserialize)]
struct FlowFile {
    #[serde(flatten)]
    info: FlowInfo,
    #[serde(default)]
    data: FlowGraph,
}

struct StdoutHost;

impl DialogHost for StdoutHost {
    fn release(&self) {
        println!("[dialog closed]");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: chat-cli <flow.json>")?;
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let FlowFile { mut info, data } =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    if info.id.is_empty() {
        info.id = Uuid::new_v4().to_string();
    }

    let config = ChatConfig::from_env()?;
    let (notifier, mut alerts) = ChannelNotifier::new();
    tracing::info!(endpoint = %config.endpoint, flow = %info.id, "starting chat");

    let mut controller =
        SessionController::connect(&config, info, Arc::new(data), Arc::new(notifier));

    // Print history changes as they land
    let mut history = controller.history_store().snapshot_plus_stream();
    let render_task = tokio::spawn(async move {
        while let Some(event) = history.next().await {
            match event {
                HistoryEvent::Replaced(log) => {
                    println!("--- history ({} messages) ---", log.len());
                    log.iter().for_each(print_entry);
                }
                HistoryEvent::Appended(entry) => print_entry(&entry),
                HistoryEvent::Cleared => println!("--- history cleared ---"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.as_str() {
                    "/quit" => break,
                    "/clear" => controller.clear_chat(),
                    _ => {
                        controller.set_compose(line);
                        if let Err(SendError::Locked) = controller.send_message() {
                            println!("[waiting for the previous reply]");
                        }
                    }
                }
            }
            event = controller.recv_event() => {
                let Some(event) = event else { break };
                controller.handle_event(event);
            }
            Some(alert) = alerts.recv() => print_alert(&alert),
        }
    }

    let close_delay = config.close_delay;
    controller.close_dialog(Arc::new(StdoutHost), close_delay).await?;
    render_task.abort();

    Ok(())
}

fn print_entry(entry: &MessageEntry) {
    let who = match entry.origin() {
        Origin::Local => "you",
        Origin::Remote => "agent",
    };
    println!("{who}> {}", entry.text());
    if let Some(rationale) = entry.rationale() {
        println!("      ({rationale})");
    }
    if let Some(files) = entry.attachments() {
        println!("      [{} attachment(s)]", files.len());
    }
}

fn print_alert(alert: &Alert) {
    match alert {
        Alert::Error { title, list } => {
            println!("! {title}");
            for item in list {
                println!("!   - {item}");
            }
        }
        Alert::Notice { title } => println!("* {title}"),
        Alert::ChannelFailure { message } => println!("! connection error: {message}"),
    }
}
