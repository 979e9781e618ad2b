//! HTTP surfaces: the WebSocket delivery channel and the status route
//!
//! Each WebSocket connection is one consumer. Text (or binary) frames carrying
//! a session request start or replace that consumer's session; batches and
//! the timeout notice flow back as JSON text frames. Closing the socket
//! cancels the session.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::harvest::{ConsumerId, SessionManager, SessionRequest};
use crate::sink::{ChannelSink, LinkSink};

/// Router serving the delivery channel on `GET /`
pub fn router(manager: Arc<SessionManager>) -> Router {
    Router::new()
        .route("/", get(upgrade))
        .with_state(manager)
        .layer(TraceLayer::new_for_http())
}

/// Router answering `GET /` with a pointer to the delivery channel
pub fn status_router(ws_addr: SocketAddr) -> Router {
    let message = status_message(ws_addr);
    Router::new()
        .route("/", get(move || std::future::ready(message.clone())))
        .layer(TraceLayer::new_for_http())
}

/// Text served by the status route
#[must_use]
pub fn status_message(ws_addr: SocketAddr) -> String {
    let endpoint = if ws_addr.ip().is_unspecified() {
        format!("localhost:{}", ws_addr.port())
    } else {
        ws_addr.to_string()
    };
    format!("WebSocket server running on ws://{endpoint}. Connect for live scraping updates.")
}

async fn upgrade(ws: WebSocketUpgrade, State(manager): State<Arc<SessionManager>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, manager))
}

async fn handle_socket(socket: WebSocket, manager: Arc<SessionManager>) {
    let (ws_tx, ws_rx) = socket.split();
    serve_consumer(ws_tx, ws_rx, manager).await;
}

/// Run one consumer connection until its inbound stream ends
///
/// `ws_tx` receives JSON text frames; `ws_rx` yields the consumer's frames.
/// The consumer's session is cancelled and released before this returns.
pub async fn serve_consumer<W, R, E>(mut ws_tx: W, mut ws_rx: R, manager: Arc<SessionManager>)
where
    W: Sink<Message> + Send + Unpin + 'static,
    W::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Send + Unpin,
    E: Display + Send,
{
    let consumer = ConsumerId::new();
    info!(consumer = %consumer, "Consumer connected");

    let (sink, mut outbound) = ChannelSink::new();

    let writer_sink = sink.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!(consumer = %consumer, "Failed to encode outbound message: {e}");
                    continue;
                }
            };
            if let Err(e) = ws_tx.send(Message::Text(text)).await {
                debug!(consumer = %consumer, "Socket write failed: {e}");
                writer_sink.close();
                break;
            }
        }
    });

    let shared: Arc<dyn LinkSink> = Arc::new(sink.clone());
    while let Some(frame) = ws_rx.next().await {
        let payload = match frame {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(consumer = %consumer, "Socket read failed: {e}");
                break;
            }
        };
        handle_request(&manager, consumer, &payload, &shared).await;
    }

    sink.close();
    manager.disconnect(consumer).await;
    writer.abort();
    info!(consumer = %consumer, "Consumer disconnected");
}

/// Start a session from one inbound frame; bad input is logged and ignored
async fn handle_request(
    manager: &SessionManager,
    consumer: ConsumerId,
    payload: &[u8],
    sink: &Arc<dyn LinkSink>,
) {
    let request: SessionRequest = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(consumer = %consumer, "Ignoring malformed session request: {e}");
            return;
        }
    };

    match manager.start(consumer, request, Arc::clone(sink)).await {
        Ok(session) => info!(consumer = %consumer, session = %session, "Session started"),
        Err(e) => warn!(consumer = %consumer, "Session request rejected: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_unspecified_host() {
        let addr: SocketAddr = "0.0.0.0:8080".parse().unwrap();
        assert_eq!(
            status_message(addr),
            "WebSocket server running on ws://localhost:8080. Connect for live scraping updates."
        );
    }

    #[test]
    fn test_status_message_explicit_host() {
        let addr: SocketAddr = "127.0.0.1:8888".parse().unwrap();
        assert_eq!(
            status_message(addr),
            "WebSocket server running on ws://127.0.0.1:8888. Connect for live scraping updates."
        );
    }
}
