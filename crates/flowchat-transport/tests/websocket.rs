//! End-to-end channel tests against an in-process peer.

use std::time::Duration;

use axum::{
    Router,
    extract::{
        Path, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use flowchat_core::FlowGraph;
use flowchat_transport::{
    ChannelEvent, ChannelState, ChatRequest, Connection, ConnectionManager, Connector, EndFrame,
    InboundFrame, OutboundPayload,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;

async fn spawn_peer() -> String {
    let app = Router::new().route("/chat/{id}", get(ws_handler));
    let listener = tokio_test::assert_ok!(tokio::net::TcpListener::bind("127.0.0.1:0").await);
    let addr = tokio_test::assert_ok!(listener.local_addr());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/chat")
}

async fn ws_handler(ws: WebSocketUpgrade, Path(id): Path<String>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| peer(socket, id))
}

async fn peer(mut socket: WebSocket, id: String) {
    let snapshot = json!([
        {"is_bot": false, "message": format!("hello {id}"), "type": "human"},
        {"is_bot": true, "message": "", "type": "bot"}
    ]);
    if socket.send(Message::Text(snapshot.to_string().into())).await.is_err() {
        return;
    }

    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let value: Value = serde_json::from_str(text.as_str()).unwrap();

        if value["message"] == "bye" {
            let _ = socket.send(Message::Close(None)).await;
            return;
        }

        let reply = if value.get("clear_history").is_some() {
            json!({"type": "cleared"})
        } else {
            json!({"type": "end", "message": format!("echo: {}", value["message"].as_str().unwrap_or_default())})
        };
        if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
            return;
        }
    }
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    let event = tokio_test::assert_ok!(
        tokio::time::timeout(Duration::from_secs(5), rx.recv()).await,
        "timed out waiting for channel event"
    );
    event.expect("event queue closed")
}

fn chat(message: &str) -> OutboundPayload {
    OutboundPayload::Chat(ChatRequest {
        graph: FlowGraph::default(),
        message: message.to_string(),
        chat_history: Vec::new(),
        name: "Flow".to_string(),
        description: String::new(),
    })
}

#[tokio::test]
async fn test_open_snapshot_and_end_frame() {
    let endpoint = spawn_peer().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handle = ConnectionManager::new(endpoint).open("flow-1", tx);

    assert_eq!(next_event(&mut rx).await, ChannelEvent::Opened);
    assert_eq!(handle.state(), ChannelState::Open);

    match next_event(&mut rx).await {
        ChannelEvent::Frame(InboundFrame::Snapshot(records)) => {
            assert_eq!(records.len(), 2);
            assert_eq!(records[0].message.as_deref(), Some("hello flow-1"));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    handle.send(&chat("hi"));
    assert_eq!(
        next_event(&mut rx).await,
        ChannelEvent::Frame(InboundFrame::End(EndFrame {
            message: Some("echo: hi".to_string()),
            ..EndFrame::default()
        }))
    );

    handle.send(&OutboundPayload::clear_history());
    assert_eq!(
        next_event(&mut rx).await,
        ChannelEvent::Frame(InboundFrame::Unknown(Some("cleared".to_string())))
    );

    handle.close();
    assert_eq!(handle.state(), ChannelState::Closed);
}

#[tokio::test]
async fn test_peer_close_reports_closed() {
    let endpoint = spawn_peer().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = ConnectionManager::new(endpoint).open("flow-2", tx);

    assert_eq!(next_event(&mut rx).await, ChannelEvent::Opened);
    assert!(matches!(next_event(&mut rx).await, ChannelEvent::Frame(_)));

    handle.send(&chat("bye"));

    assert_eq!(next_event(&mut rx).await, ChannelEvent::Closed);
    assert_eq!(handle.state(), ChannelState::Closed);
}

#[tokio::test]
async fn test_unreachable_peer_reports_error_then_closed() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = ConnectionManager::new(format!("ws://{addr}/chat")).open("flow-3", tx);

    assert!(matches!(next_event(&mut rx).await, ChannelEvent::Error(_)));
    assert_eq!(next_event(&mut rx).await, ChannelEvent::Closed);
    assert_eq!(handle.state(), ChannelState::Closed);

    handle.send(&chat("ignored"));
}
