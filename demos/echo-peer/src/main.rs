//! Minimal chat peer for local runs.
//!
//! Run with: cargo run -p echo-peer
//!
//! Listens on `ws://127.0.0.1:5003/chat/{id}`, replays the stored history
//! on connect and answers every chat request with an echo.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use flowchat_transport::{ChatRequest, TurnRecord};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Conversation per flow id, kept for the lifetime of the process.
#[derive(Clone, Default)]
struct AppState {
    histories: Arc<RwLock<HashMap<String, Vec<TurnRecord>>>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let app = Router::new()
        .route("/chat/{id}", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState::default());

    let addr: SocketAddr = std::env::var("FLOWCHAT_PEER_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:5003".to_string())
        .parse()?;
    tracing::info!("Peer listening on ws://{addr}/chat/{{id}}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, id, state))
}

async fn handle_socket(mut socket: WebSocket, id: String, state: AppState) {
    tracing::info!(flow = %id, "client connected");

    let snapshot = state
        .histories
        .read()
        .await
        .get(&id)
        .cloned()
        .unwrap_or_default();
    if !send_json(&mut socket, &snapshot).await {
        return;
    }

    while let Some(msg) = socket.recv().await {
        let text = match msg {
            Ok(Message::Text(t)) => t,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("WebSocket error: {e}");
                break;
            }
        };

        let value: Value = match serde_json::from_str(text.as_str()) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Invalid client message: {e}");
                continue;
            }
        };

        if value.get("clear_history").and_then(Value::as_bool) == Some(true) {
            state.histories.write().await.remove(&id);
            tracing::info!(flow = %id, "history cleared");
            continue;
        }

        let request: ChatRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Invalid chat request: {e}");
                continue;
            }
        };

        let reply = format!("echo: {}", request.message);
        let steps = format!(
            "flow '{}' has {} node(s); {} earlier message(s)",
            request.name,
            request.graph.nodes.len(),
            request.chat_history.len()
        );

        {
            let mut histories = state.histories.write().await;
            let history = histories.entry(id.clone()).or_default();
            history.push(TurnRecord {
                is_bot: false,
                message: Some(request.message),
                kind: Some("human".to_string()),
                ..TurnRecord::default()
            });
            history.push(TurnRecord {
                is_bot: true,
                message: Some(reply.clone()),
                intermediate_steps: Some(steps.clone()),
                kind: Some("bot".to_string()),
                ..TurnRecord::default()
            });
        }

        let end = json!({"type": "end", "message": reply, "intermediate_steps": steps});
        if !send_json(&mut socket, &end).await {
            break;
        }
    }

    tracing::info!(flow = %id, "client disconnected");
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> bool {
    let json = match serde_json::to_string(value) {
        Ok(j) => j,
        Err(e) => {
            tracing::error!("Failed to serialize message: {e}");
            return false;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}
