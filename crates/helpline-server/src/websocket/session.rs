//! WebSocket session lifecycle — handles a single connected client from
//! upgrade through disconnect.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use helpline_core::{ChatEvent, EVENT_CONNECTION_ESTABLISHED};
use helpline_rpc::Caller;
use helpline_runtime::ClientConnection;
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::auth::Principal;
use crate::server::AppState;

use super::handler::handle_message;

/// Outbound queue depth per connection. A client that falls this far
/// behind is disconnected by the registry's fan-out path.
const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// Run a WebSocket session for a connected client.
///
/// 1. Sends a `connection.established` event with the connection id
/// 2. Dispatches incoming text frames as RPC requests
/// 3. Forwards RPC responses and session events via the send channel
/// 4. Sends periodic Ping frames and disconnects unresponsive clients
/// 5. Unbinds the connection on disconnect
#[instrument(skip_all, fields(identity = principal.identity, role = %principal.role))]
pub async fn run_ws_session(ws: WebSocket, principal: Principal, state: AppState) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(OUTBOUND_QUEUE_DEPTH);
    let connection = Arc::new(ClientConnection::new(
        principal.identity,
        principal.role,
        send_tx,
    ));
    let caller = Caller::new(Arc::clone(&connection));
    let conn_id = connection.id.clone();

    let connection_start = std::time::Instant::now();
    info!(conn_id = %conn_id, anonymous = principal.anonymous, "client connected");
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);
    let _ = state.connections.fetch_add(1, Ordering::Relaxed);

    // Greeting: tells the client its connection id and resolved identity.
    let established = ChatEvent::new(
        EVENT_CONNECTION_ESTABLISHED,
        None,
        Some(serde_json::json!({
            "clientId": conn_id,
            "identity": principal.identity,
            "role": principal.role,
        })),
    );
    if let Ok(json) = serde_json::to_string(&established) {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }

    let ping_interval = Duration::from_secs(state.config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(state.config.heartbeat_timeout_secs);

    // Outbound forwarder: drains the send channel, emits Ping frames, and
    // exits when the connection or the server is told to stop.
    let outbound_conn = Arc::clone(&connection);
    let outbound_shutdown = state.shutdown.token();
    let outbound = tokio::spawn(async move {
        let outbound_cancel = outbound_conn.cancellation_token();
        let mut ping = tokio::time::interval(ping_interval);
        // Skip the immediate first tick.
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                        outbound_conn.close();
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                () = outbound_shutdown.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Inbound loop: parse frames, dispatch RPCs, enqueue responses.
    let cancel = connection.cancellation_token();
    let shutdown = state.shutdown.token();
    loop {
        let msg = tokio::select! {
            m = ws_rx.next() => m,
            () = cancel.cancelled() => break,
            () = shutdown.cancelled() => break,
        };
        let Some(Ok(msg)) = msg else { break };

        // Extract text from either Text or Binary frames; some clients
        // send UTF-8 payloads in binary frames.
        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => Some(s.to_owned()),
                Err(_) => {
                    info!(conn_id = %conn_id, len = data.len(), "received non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                info!(conn_id = %conn_id, "client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };

        let Some(text) = text else { continue };

        let result = handle_message(&text, &state.registry, &state.ctx, &caller).await;

        if !enqueue_response(&connection, result.response_json) {
            warn!(
                conn_id = %conn_id,
                method = result.method,
                dropped = connection.drop_count(),
                "outbound queue full, disconnecting"
            );
            break;
        }
    }

    // Clean up.
    info!(conn_id = %conn_id, dropped = connection.drop_count(), "client disconnected");
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    histogram!("ws_connection_duration_seconds").record(connection_start.elapsed().as_secs_f64());
    let _ = state.connections.fetch_sub(1, Ordering::Relaxed);
    outbound.abort();
    state.sessions.unbind_connection(&conn_id).await;
}

/// Queue an RPC response for the client.
///
/// A full queue means the client stopped draining its socket. The
/// connection is cancelled so the session tears down and the client
/// recovers via catch-up on reconnect, the same policy the registry
/// applies to fan-out overflow.
fn enqueue_response(connection: &ClientConnection, response_json: String) -> bool {
    if connection.send(Arc::new(response_json)) {
        return true;
    }
    connection.close();
    false
}

#[cfg(test)]
mod tests {
    // Full socket behavior is covered by tests/integration.rs; these
    // validate the greeting shape and the response-enqueue policy.

    use std::sync::Arc;

    use helpline_core::{ChatEvent, ParticipantRole, EVENT_CONNECTION_ESTABLISHED};
    use helpline_runtime::ClientConnection;
    use tokio::sync::mpsc;

    use super::enqueue_response;

    #[test]
    fn greeting_has_required_fields() {
        let event = ChatEvent::new(
            EVENT_CONNECTION_ESTABLISHED,
            None,
            Some(serde_json::json!({
                "clientId": "conn_abc",
                "identity": 42,
                "role": "customer",
            })),
        );
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "connection.established");
        assert_eq!(v["data"]["clientId"], "conn_abc");
        assert_eq!(v["data"]["identity"], 42);
        assert!(v["timestamp"].is_string());
        assert!(v.get("sessionId").is_none());
    }

    #[tokio::test]
    async fn response_enqueue_with_capacity_delivers() {
        let (tx, mut rx) = mpsc::channel(4);
        let conn = ClientConnection::new(1, ParticipantRole::Customer, tx);

        assert!(enqueue_response(&conn, r#"{"id":"r1","success":true}"#.into()));
        assert!(!conn.is_closed());
        assert_eq!(rx.try_recv().unwrap().as_str(), r#"{"id":"r1","success":true}"#);
    }

    #[tokio::test]
    async fn response_enqueue_overflow_cancels_connection() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = ClientConnection::new(1, ParticipantRole::Customer, tx);
        // Fill the queue; the client is not draining.
        assert!(conn.send(Arc::new("filler".into())));

        assert!(!enqueue_response(&conn, r#"{"id":"r2","success":true}"#.into()));
        assert!(conn.is_closed());
        assert_eq!(conn.drop_count(), 1);
    }
}
