//! Message handlers: send, mark_read, history.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::instrument;

use crate::context::{Caller, RpcContext};
use crate::errors::RpcError;
use crate::handlers::{optional_i64_param, require_session_id, require_string_param, MAX_BODY_LENGTH};
use crate::registry::MethodHandler;

/// Append a message to a session and fan it out.
pub struct SendMessageHandler;

#[async_trait]
impl MethodHandler for SendMessageHandler {
    #[instrument(skip_all, fields(method = "message.send"))]
    async fn handle(
        &self,
        params: Option<Value>,
        ctx: &RpcContext,
        caller: &Caller,
    ) -> Result<Value, RpcError> {
        let session_id = require_session_id(params.as_ref())?;
        let body = require_string_param(params.as_ref(), "body")?;
        if body.is_empty() {
            return Err(RpcError::InvalidParams {
                message: "Parameter 'body' must not be empty".into(),
            });
        }
        if body.len() > MAX_BODY_LENGTH {
            return Err(RpcError::InvalidParams {
                message: format!(
                    "Parameter 'body' exceeds maximum length ({} > {MAX_BODY_LENGTH})",
                    body.len()
                ),
            });
        }

        let message = ctx
            .coordinator
            .send(
                Some(caller.conn_id()),
                &session_id,
                caller.role(),
                caller.identity(),
                &body,
            )
            .await?;
        Ok(json!({ "message": message }))
    }
}

/// Mark the opposing role's messages as read.
pub struct MarkReadHandler;

#[async_trait]
impl MethodHandler for MarkReadHandler {
    #[instrument(skip_all, fields(method = "message.mark_read"))]
    async fn handle(
        &self,
        params: Option<Value>,
        ctx: &RpcContext,
        caller: &Caller,
    ) -> Result<Value, RpcError> {
        let session_id = require_session_id(params.as_ref())?;
        let updated = ctx
            .coordinator
            .mark_read(&session_id, caller.role(), caller.identity())
            .await?;
        Ok(json!({ "updated": updated }))
    }
}

/// Fetch a session's messages, ascending by sequence id.
pub struct MessageHistoryHandler;

#[async_trait]
impl MethodHandler for MessageHistoryHandler {
    #[instrument(skip_all, fields(method = "message.history"))]
    async fn handle(
        &self,
        params: Option<Value>,
        ctx: &RpcContext,
        caller: &Caller,
    ) -> Result<Value, RpcError> {
        let session_id = require_session_id(params.as_ref())?;
        let since_seq = optional_i64_param(params.as_ref(), "sinceSeq")?;
        let messages = ctx
            .coordinator
            .history(&session_id, caller.role(), caller.identity(), since_seq)
            .await?;
        Ok(json!({ "messages": messages }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::session::CreateSessionHandler;
    use crate::handlers::test_helpers::{make_caller, make_test_context};
    use helpline_core::ParticipantRole;

    async fn create_session(ctx: &RpcContext, caller: &Caller) -> String {
        let created = CreateSessionHandler.handle(None, ctx, caller).await.unwrap();
        created["session"]["sessionId"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn send_returns_message_with_seq() {
        let ctx = make_test_context();
        let (customer, _rx) = make_caller(1, ParticipantRole::Customer);
        let session_id = create_session(&ctx, &customer).await;

        let result = SendMessageHandler
            .handle(
                Some(json!({"sessionId": session_id, "body": "Xin chào"})),
                &ctx,
                &customer,
            )
            .await
            .unwrap();
        assert_eq!(result["message"]["seq"], 1);
        assert_eq!(result["message"]["body"], "Xin chào");
        assert_eq!(result["message"]["senderKind"], "customer");
        assert_eq!(result["message"]["senderIdentity"], 1);
    }

    #[tokio::test]
    async fn send_rejects_empty_body() {
        let ctx = make_test_context();
        let (customer, _rx) = make_caller(1, ParticipantRole::Customer);
        let session_id = create_session(&ctx, &customer).await;

        let err = SendMessageHandler
            .handle(
                Some(json!({"sessionId": session_id, "body": ""})),
                &ctx,
                &customer,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn send_rejects_oversized_body() {
        let ctx = make_test_context();
        let (customer, _rx) = make_caller(1, ParticipantRole::Customer);
        let session_id = create_session(&ctx, &customer).await;

        let body = "x".repeat(MAX_BODY_LENGTH + 1);
        let err = SendMessageHandler
            .handle(
                Some(json!({"sessionId": session_id, "body": body})),
                &ctx,
                &customer,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn send_to_closed_session_invalid_state() {
        let ctx = make_test_context();
        let (customer, _rx) = make_caller(1, ParticipantRole::Customer);
        let session_id = create_session(&ctx, &customer).await;
        let sid = helpline_core::SessionId::from(session_id.as_str());
        ctx.coordinator
            .close(&sid, ParticipantRole::Customer, 1)
            .await
            .unwrap();

        let err = SendMessageHandler
            .handle(
                Some(json!({"sessionId": session_id, "body": "late"})),
                &ctx,
                &customer,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn mark_read_counts_updates() {
        let ctx = make_test_context();
        let (customer, _c_rx) = make_caller(1, ParticipantRole::Customer);
        let (admin, _a_rx) = make_caller(9, ParticipantRole::Admin);
        let session_id = create_session(&ctx, &customer).await;

        let _ = SendMessageHandler
            .handle(
                Some(json!({"sessionId": session_id, "body": "need help"})),
                &ctx,
                &customer,
            )
            .await
            .unwrap();

        let result = MarkReadHandler
            .handle(Some(json!({"sessionId": session_id})), &ctx, &admin)
            .await
            .unwrap();
        assert_eq!(result["updated"], 1);

        // Nothing left unread for the admin.
        let again = MarkReadHandler
            .handle(Some(json!({"sessionId": session_id})), &ctx, &admin)
            .await
            .unwrap();
        assert_eq!(again["updated"], 0);
    }

    #[tokio::test]
    async fn history_respects_since_seq() {
        let ctx = make_test_context();
        let (customer, _rx) = make_caller(1, ParticipantRole::Customer);
        let session_id = create_session(&ctx, &customer).await;

        for i in 1..=6 {
            let _ = SendMessageHandler
                .handle(
                    Some(json!({"sessionId": session_id, "body": format!("m{i}")})),
                    &ctx,
                    &customer,
                )
                .await
                .unwrap();
        }

        let result = MessageHistoryHandler
            .handle(
                Some(json!({"sessionId": session_id, "sinceSeq": 4})),
                &ctx,
                &customer,
            )
            .await
            .unwrap();
        let seqs: Vec<i64> = result["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(seqs, vec![5, 6]);
    }

    #[tokio::test]
    async fn history_rejects_foreign_customer() {
        let ctx = make_test_context();
        let (owner, _rx1) = make_caller(1, ParticipantRole::Customer);
        let (stranger, _rx2) = make_caller(2, ParticipantRole::Customer);
        let session_id = create_session(&ctx, &owner).await;

        let err = MessageHistoryHandler
            .handle(Some(json!({"sessionId": session_id})), &ctx, &stranger)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_AUTHORIZED");
    }
}
