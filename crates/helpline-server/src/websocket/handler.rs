//! WebSocket message dispatch — parses incoming text as `RpcRequest` and
//! routes through the `MethodRegistry`.

use helpline_rpc::errors::INVALID_PARAMS;
use helpline_rpc::{Caller, MethodRegistry, RpcContext, RpcRequest, RpcResponse};
use tracing::{debug, instrument, warn};

/// Result of handling a WebSocket message.
pub struct HandleResult {
    /// Serialized JSON response to send back.
    pub response_json: String,
    /// The RPC method that was called (empty if parse failed).
    pub method: String,
    /// Typed response (for extracting structured data without re-parsing).
    pub response: RpcResponse,
}

/// Handle an incoming WebSocket text message.
///
/// Parses the message as an `RpcRequest`, dispatches to the registry, and
/// returns the serialized `RpcResponse` along with the method name.
#[instrument(skip_all, fields(method, conn_id = %caller.conn_id()))]
pub async fn handle_message(
    message: &str,
    registry: &MethodRegistry,
    ctx: &RpcContext,
    caller: &Caller,
) -> HandleResult {
    let request: RpcRequest = match serde_json::from_str(message) {
        Ok(r) => r,
        Err(e) => {
            warn!("invalid JSON received");
            let resp = RpcResponse::error("unknown", INVALID_PARAMS, format!("Invalid JSON: {e}"));
            let json = serde_json::to_string(&resp).unwrap_or_else(|e| {
                tracing::error!(error = %e, "failed to serialize error response");
                String::new()
            });
            return HandleResult {
                response_json: json,
                method: String::new(),
                response: resp,
            };
        }
    };

    let method = request.method.clone();
    let id = &request.id;
    let _ = tracing::Span::current().record("method", method.as_str());
    debug!(method, id, "dispatching RPC");

    if !registry.has_method(&method) {
        warn!(method, "unknown RPC method");
    }

    let response = registry.dispatch(request, ctx, caller).await;
    let json = serde_json::to_string(&response).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize response");
        String::new()
    });
    HandleResult {
        response_json: json,
        method,
        response,
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use helpline_core::ParticipantRole;
    use helpline_rpc::handlers::register_all;
    use helpline_runtime::{ClientConnection, Coordinator, Notifier, SessionRegistry};
    use helpline_store::{new_in_memory, run_migrations, ChatStore, ConnectionConfig};
    use tokio::sync::mpsc;

    fn make_test_ctx() -> RpcContext {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            run_migrations(&conn).unwrap();
        }
        let store = Arc::new(ChatStore::new(pool));
        let coordinator = Arc::new(Coordinator::new(
            store,
            Arc::new(SessionRegistry::new()),
            Notifier::new(16),
        ));
        RpcContext { coordinator }
    }

    fn make_caller(role: ParticipantRole) -> (Caller, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(64);
        (Caller::new(Arc::new(ClientConnection::new(1, role, tx))), rx)
    }

    fn full_registry() -> MethodRegistry {
        let mut reg = MethodRegistry::new();
        register_all(&mut reg);
        reg
    }

    #[tokio::test]
    async fn valid_request_dispatches() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let (caller, _rx) = make_caller(ParticipantRole::Customer);

        let msg = r#"{"id":"r1","method":"session.create"}"#;
        let result = handle_message(msg, &reg, &ctx, &caller).await;
        assert_eq!(result.method, "session.create");
        assert!(result.response.success);
        assert_eq!(result.response.id, "r1");
        assert!(result.response_json.contains("\"sessionId\""));
    }

    #[tokio::test]
    async fn invalid_json_returns_error_with_unknown_id() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let (caller, _rx) = make_caller(ParticipantRole::Customer);

        let result = handle_message("not json at all", &reg, &ctx, &caller).await;
        assert!(!result.response.success);
        assert_eq!(result.response.id, "unknown");
        assert!(result.method.is_empty());
        let err = result.response.error.unwrap();
        assert_eq!(err.code, "INVALID_PARAMS");
        assert!(err.message.contains("Invalid JSON"));
    }

    #[tokio::test]
    async fn empty_message_returns_error() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let (caller, _rx) = make_caller(ParticipantRole::Customer);

        let result = handle_message("", &reg, &ctx, &caller).await;
        assert!(!result.response.success);
        assert_eq!(result.response.error.unwrap().code, "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn missing_method_returns_not_found() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let (caller, _rx) = make_caller(ParticipantRole::Customer);

        let msg = r#"{"id":"r2","method":"no.such"}"#;
        let result = handle_message(msg, &reg, &ctx, &caller).await;
        assert!(!result.response.success);
        assert_eq!(result.response.error.unwrap().code, "METHOD_NOT_FOUND");
    }

    #[tokio::test]
    async fn response_preserves_request_id() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let (caller, _rx) = make_caller(ParticipantRole::Customer);

        let msg = r#"{"id":"unique_42","method":"session.create"}"#;
        let result = handle_message(msg, &reg, &ctx, &caller).await;
        assert_eq!(result.response.id, "unique_42");
    }

    #[tokio::test]
    async fn caller_identity_flows_into_handlers() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let (admin, _rx) = make_caller(ParticipantRole::Admin);

        // Admins cannot create sessions; the role must come from the caller,
        // not from request params.
        let msg = r#"{"id":"r3","method":"session.create","params":{"role":"customer"}}"#;
        let result = handle_message(msg, &reg, &ctx, &admin).await;
        assert!(!result.response.success);
        assert_eq!(result.response.error.unwrap().code, "NOT_AUTHORIZED");
    }

    #[tokio::test]
    async fn non_object_json_returns_error() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let (caller, _rx) = make_caller(ParticipantRole::Customer);

        let result = handle_message("[1,2,3]", &reg, &ctx, &caller).await;
        assert!(!result.response.success);
        assert_eq!(result.response.error.unwrap().code, "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn json_missing_method_field_is_parse_error() {
        let reg = full_registry();
        let ctx = make_test_ctx();
        let (caller, _rx) = make_caller(ParticipantRole::Customer);

        let result = handle_message(r#"{"id":"r4"}"#, &reg, &ctx, &caller).await;
        assert!(!result.response.success);
        assert_eq!(result.response.id, "unknown");
    }
}
