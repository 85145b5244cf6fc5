// src/realtime/socket.rs

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::realtime::{envelope, Channel, EventKind, Registry};
use crate::state::AppState;

/// Role a connection declares at connect time. This layer is a delivery
/// mechanism, not a trust boundary: the assertion is taken at face
/// value and only decides which channels the connection joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WsRole {
    Student,
    Teacher,
}

/// Query parameters of the websocket handshake,
/// e.g. `/ws?role=student&id=5&examId=3`.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub role: WsRole,
    pub id: i64,
    #[serde(default, alias = "examId")]
    pub exam_id: Option<i64>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, params, state.registry))
}

/// Which channels a connection joins, from its declared identity.
/// Students follow their own channel plus the exam they are sitting;
/// teachers follow the exam they are watching.
fn channels_for(params: &ConnectParams) -> Vec<Channel> {
    let mut channels = Vec::new();
    match params.role {
        WsRole::Student => {
            channels.push(Channel::Student(params.id));
            if let Some(exam_id) = params.exam_id {
                channels.push(Channel::Exam(exam_id));
            }
        }
        WsRole::Teacher => {
            if let Some(exam_id) = params.exam_id {
                channels.push(Channel::Exam(exam_id));
            }
        }
    }
    channels
}

async fn handle_socket(socket: WebSocket, params: ConnectParams, registry: Arc<Registry>) {
    let channels = channels_for(&params);
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let connection_id = registry.subscribe(channels, outbound_tx.clone());
    send_greeting(&outbound_tx);
    tracing::info!(
        "websocket {} connected: role={:?} id={} exam={:?}",
        connection_id,
        params.role,
        params.id,
        params.exam_id
    );

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Everything published to this connection funnels through one
    // writer task; the registry side never touches the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if ws_tx.send(Message::Text(message.into())).await.is_err() {
                break;
            }
        }
    });

    let inbound_registry = registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = ws_rx.next().await {
            match message {
                Message::Text(text) => {
                    handle_client_message(text.as_str(), &params, &inbound_registry, &outbound_tx);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.unsubscribe(connection_id);
    tracing::info!("websocket {} disconnected", connection_id);
}

/// Acknowledges a fresh subscription; the first frame a client sees.
fn send_greeting(reply: &mpsc::UnboundedSender<String>) {
    let _ = reply.send(envelope(
        EventKind::Connected,
        json!({ "message": "Connected to realtime updates" }),
    ));
}

fn handle_client_message(
    text: &str,
    params: &ConnectParams,
    registry: &Registry,
    reply: &mpsc::UnboundedSender<String>,
) {
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(text) else {
        return;
    };
    let Some(kind) = parsed.get("type").and_then(|v| v.as_str()).map(str::to_owned) else {
        return;
    };

    match kind.as_str() {
        "ping" => {
            let _ = reply.send(envelope(EventKind::Pong, json!({})));
        }
        // Students push their own progress; it fans out to everyone
        // watching the exam channel.
        "exam_progress" => {
            if params.role != WsRole::Student {
                return;
            }
            let Some(exam_id) = params.exam_id else {
                return;
            };
            let serde_json::Value::Object(mut fields) = parsed else {
                return;
            };
            fields.remove("type");
            fields.insert("student_id".to_string(), json!(params.id));
            registry.publish(
                Channel::Exam(exam_id),
                EventKind::ExamProgress,
                serde_json::Value::Object(fields),
            );
        }
        _ => {}
    }
}
