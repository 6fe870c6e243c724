//! Session handlers: create, list, attach, close.

use async_trait::async_trait;
use helpline_core::SessionStatus;
use helpline_store::SessionFilter;
use serde_json::{json, Value};
use tracing::instrument;

use crate::context::{Caller, RpcContext};
use crate::errors::RpcError;
use crate::handlers::{optional_i64_param, require_session_id};
use crate::registry::MethodHandler;

/// Create a session for the calling customer, or return their open one.
pub struct CreateSessionHandler;

#[async_trait]
impl MethodHandler for CreateSessionHandler {
    #[instrument(skip_all, fields(method = "session.create"))]
    async fn handle(
        &self,
        _params: Option<Value>,
        ctx: &RpcContext,
        caller: &Caller,
    ) -> Result<Value, RpcError> {
        let session = ctx
            .coordinator
            .create_or_get(caller.identity(), caller.role())
            .await?;
        Ok(json!({ "session": session }))
    }
}

/// List sessions for the admin console.
pub struct ListSessionsHandler;

#[async_trait]
impl MethodHandler for ListSessionsHandler {
    #[instrument(skip_all, fields(method = "session.list"))]
    async fn handle(
        &self,
        params: Option<Value>,
        ctx: &RpcContext,
        caller: &Caller,
    ) -> Result<Value, RpcError> {
        let status = match params.as_ref().and_then(|p| p.get("status")) {
            None | Some(Value::Null) => None,
            Some(value) => {
                let raw = value.as_str().ok_or_else(|| RpcError::InvalidParams {
                    message: "Parameter 'status' must be a string".into(),
                })?;
                Some(
                    SessionStatus::parse(raw).ok_or_else(|| RpcError::InvalidParams {
                        message: format!("Unknown status '{raw}'"),
                    })?,
                )
            }
        };
        let assigned_admin = optional_i64_param(params.as_ref(), "assignedAdmin")?;

        let sessions = ctx
            .coordinator
            .list(
                caller.role(),
                &SessionFilter {
                    status,
                    assigned_admin,
                },
            )
            .await?;
        Ok(json!({ "sessions": sessions }))
    }
}

/// Bind the calling connection to a session and replay history.
pub struct AttachSessionHandler;

#[async_trait]
impl MethodHandler for AttachSessionHandler {
    #[instrument(skip_all, fields(method = "session.attach"))]
    async fn handle(
        &self,
        params: Option<Value>,
        ctx: &RpcContext,
        caller: &Caller,
    ) -> Result<Value, RpcError> {
        let session_id = require_session_id(params.as_ref())?;
        let since_seq = optional_i64_param(params.as_ref(), "sinceSeq")?;

        let (session, messages) = ctx
            .coordinator
            .attach(&caller.connection, &session_id, since_seq)
            .await?;
        Ok(json!({ "session": session, "messages": messages }))
    }
}

/// Close a session (owning customer or any admin).
pub struct CloseSessionHandler;

#[async_trait]
impl MethodHandler for CloseSessionHandler {
    #[instrument(skip_all, fields(method = "session.close"))]
    async fn handle(
        &self,
        params: Option<Value>,
        ctx: &RpcContext,
        caller: &Caller,
    ) -> Result<Value, RpcError> {
        let session_id = require_session_id(params.as_ref())?;
        let session = ctx
            .coordinator
            .close(&session_id, caller.role(), caller.identity())
            .await?;
        Ok(json!({ "sessionId": session.session_id, "status": session.status }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
