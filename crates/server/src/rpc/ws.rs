// Push channel: a WebSocket that receives list-changed notifications for as
// long as it stays connected. Text frames sent by the client are answered as
// JSON-RPC requests.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use focal_common::protocol::jsonrpc::Notification;
use tokio::sync::mpsc;
use tracing::warn;

use super::transport::handle_raw_request;
use crate::runtime::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/mcp/ws", get(push_ws_route))
}

async fn push_ws_route(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (outbound_sender, mut outbound_receiver) = mpsc::unbounded_channel::<Notification>();
    let channel_id = state.notifier.register(outbound_sender).await;

    loop {
        tokio::select! {
            maybe_outbound = outbound_receiver.recv() => {
                let Some(notification) = maybe_outbound else {
                    break;
                };
                if send_json(&mut socket, &notification).await.is_err() {
                    break;
                }
            }
            maybe_message = socket.recv() => {
                let Some(Ok(message)) = maybe_message else {
                    break;
                };

                match message {
                    WsMessage::Text(payload) => {
                        if let Some(response) =
                            handle_raw_request(payload.as_bytes(), &state.dispatcher).await
                        {
                            if send_json(&mut socket, &response).await.is_err() {
                                break;
                            }
                        }
                    }
                    WsMessage::Ping(payload) => {
                        if socket.send(WsMessage::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    WsMessage::Binary(_) | WsMessage::Pong(_) => {}
                    WsMessage::Close(_) => break,
                }
            }
        }
    }

    state.notifier.unregister(channel_id).await;
}

async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, payload: &T) -> Result<(), ()> {
    let encoded = serde_json::to_string(payload).map_err(|error| {
        warn!(%error, "failed to encode push channel message");
    })?;
    socket.send(WsMessage::Text(encoded.into())).await.map_err(|_| ())
}
