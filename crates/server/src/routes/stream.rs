// crates/server/src/routes/stream.rs
//! Live job updates over WebSocket and SSE.
//!
//! Both transports carry the same message sequence: a synthetic `status`
//! first, then every `progress`/`status` event of the job until it reaches
//! a terminal status or the client goes away.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::error::ApiResult;
use crate::live::{EventRelay, RelayError};
use crate::state::AppState;

const UNAVAILABLE: &str = r#"{"type":"error","message":"live updates unavailable"}"#;

/// GET /api/scan/{id}/ws
async fn scan_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let relay = state.relay.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, relay, id))
}

async fn handle_socket(socket: WebSocket, relay: EventRelay, job_id: String) {
    let (mut sink, mut incoming) = socket.split();

    let mut stream = match relay.attach(&job_id).await {
        Ok(stream) => stream,
        Err(err) => {
            let text = match err {
                RelayError::ChannelUnavailable => UNAVAILABLE.to_string(),
                other => {
                    warn!(job_id = %job_id, error = %other, "Relay attach failed");
                    serde_json::json!({ "type": "error", "message": other.to_string() })
                        .to_string()
                }
            };
            let _ = sink.send(Message::Text(text.into())).await;
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };
    debug!(job_id = %job_id, "Live client attached");

    loop {
        tokio::select! {
            message = stream.next() => {
                let Some(message) = message else { break };
                if sink.send(Message::Text(message.to_json().into())).await.is_err() {
                    break;
                }
            }
            frame = incoming.next() => match frame {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Pong is handled by axum; client text is ignored.
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    debug!(job_id = %job_id, "Live client detached");
}

/// GET /api/scan/{id}/stream
async fn scan_sse(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>> {
    let mut relay_stream = state.relay.attach(&id).await?;

    let stream = async_stream::stream! {
        while let Some(message) = relay_stream.next().await {
            let name = match message.kind() {
                dupe_manager_core::EventKind::Status => "status",
                dupe_manager_core::EventKind::Progress => "progress",
                dupe_manager_core::EventKind::Error => "error",
            };
            yield Ok(Event::default().event(name).data(message.to_json()));
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scan/{id}/ws", get(scan_ws))
        .route("/scan/{id}/stream", get(scan_sse))
}
