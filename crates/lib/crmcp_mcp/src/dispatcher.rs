// @zen-component: MCP-Dispatcher
//
//! JSON-RPC dispatcher implementing the MCP request state machine.
//!
//! Transport-agnostic: the HTTP layer hands over the raw body plus whatever
//! bearer token it recovered (header, query parameter or SSE session) and
//! turns the [`Dispatch`] into a response.

use std::sync::Arc;

use crmcp_core::auth::IdentityResolver;
use crmcp_core::crm::ErrorCode;
use http::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::jsonrpc::{
    AUTH_REQUIRED, INVALID_PARAMS, INVALID_REQUEST, JsonRpcRequest, JsonRpcResponse,
    METHOD_NOT_FOUND, PARSE_ERROR, TOOL_ERROR,
};
use crate::tools::ToolInvoker;
use crate::tools::catalog::TOOL_LIST;

/// Protocol revision announced by `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Revisions a client may ask for and get echoed back.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

pub const SERVER_NAME: &str = "crmcp";

/// Methods that never require a bearer token.
const PUBLIC_METHODS: &[&str] = &["initialize", "tools/list", "ping"];

/// Outcome of dispatching one envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A response envelope with HTTP 200.
    Reply(JsonRpcResponse),
    /// Body was not JSON or not a request object (HTTP 400).
    BadRequest(JsonRpcResponse),
    /// No usable token (HTTP 401 with a `WWW-Authenticate` challenge).
    AuthRequired(JsonRpcResponse),
    /// Notification: HTTP 202 with an empty body.
    Accepted,
}

impl Dispatch {
    pub fn status(&self) -> StatusCode {
        match self {
            Dispatch::Reply(_) => StatusCode::OK,
            Dispatch::BadRequest(_) => StatusCode::BAD_REQUEST,
            Dispatch::AuthRequired(_) => StatusCode::UNAUTHORIZED,
            Dispatch::Accepted => StatusCode::ACCEPTED,
        }
    }

    pub fn body(&self) -> Option<&JsonRpcResponse> {
        match self {
            Dispatch::Reply(r) | Dispatch::BadRequest(r) | Dispatch::AuthRequired(r) => Some(r),
            Dispatch::Accepted => None,
        }
    }
}

pub fn is_public_method(method: &str) -> bool {
    PUBLIC_METHODS.contains(&method)
}

/// Static `initialize` result. A supported client revision is echoed.
pub fn initialize_result(params: Option<&Value>) -> Value {
    let requested = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v));
    json!({
        "protocolVersion": requested.unwrap_or(PROTOCOL_VERSION),
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": SERVER_NAME, "version": crate::version() },
        "instructions": "CRM tools for accounts, contacts, opportunities, tasks and reminders. \
                         All data is scoped to the signed-in user's workspace.",
    })
}

/// Routes JSON-RPC envelopes.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: Arc<dyn IdentityResolver>,
    invoker: ToolInvoker,
}

impl Dispatcher {
    pub fn new(resolver: Arc<dyn IdentityResolver>, invoker: ToolInvoker) -> Self {
        Self { resolver, invoker }
    }

    /// Dispatch a raw request body.
    pub async fn dispatch_bytes(&self, body: &[u8], token: Option<&str>) -> Dispatch {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => self.dispatch(value, token).await,
            Err(e) => {
                debug!("unparseable JSON-RPC body: {e}");
                Dispatch::BadRequest(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    "Parse error",
                    None,
                ))
            }
        }
    }

    /// Dispatch one parsed envelope.
    pub async fn dispatch(&self, envelope: Value, token: Option<&str>) -> Dispatch {
        let request = match serde_json::from_value::<JsonRpcRequest>(envelope) {
            Ok(request) => request,
            Err(_) => {
                return Dispatch::BadRequest(JsonRpcResponse::error(
                    Value::Null,
                    INVALID_REQUEST,
                    "Invalid Request",
                    None,
                ));
            }
        };

        if request.has_null_id() {
            debug!("request with null id");
            return Dispatch::BadRequest(JsonRpcResponse::error(
                Value::Null,
                INVALID_REQUEST,
                "Invalid Request: id must not be null",
                None,
            ));
        }

        let Some(method) = request.method.clone() else {
            if request.is_notification() {
                return Dispatch::Accepted;
            }
            return Dispatch::BadRequest(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "Invalid Request: missing method",
                None,
            ));
        };

        if request.is_notification() && method.starts_with("notifications/") {
            return Dispatch::Accepted;
        }

        let notification = request.is_notification();
        debug!(method = %method, public = is_public_method(&method), "dispatching");
        let id = request.id.clone().unwrap_or(Value::Null);
        let outcome = self.handle(&method, id, request.params, token).await;

        // Requests without an id are processed but never answered.
        if notification {
            debug!(method = %method, "discarding result of id-less request");
            return Dispatch::Accepted;
        }
        outcome
    }

    async fn handle(
        &self,
        method: &str,
        id: Value,
        params: Option<Value>,
        token: Option<&str>,
    ) -> Dispatch {
        match method {
            "initialize" => Dispatch::Reply(JsonRpcResponse::success(
                id,
                initialize_result(params.as_ref()),
            )),
            "ping" => Dispatch::Reply(JsonRpcResponse::success(id, json!({}))),
            "tools/list" => Dispatch::Reply(JsonRpcResponse::success(
                id,
                json!({ "tools": &*TOOL_LIST }),
            )),
            "tools/call" => self.call_tool(id, params, token).await,
            _ => Dispatch::Reply(JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
                None,
            )),
        }
    }

    async fn call_tool(&self, id: Value, params: Option<Value>, token: Option<&str>) -> Dispatch {
        let params = params.unwrap_or(Value::Null);
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return Dispatch::Reply(JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                "Invalid params: missing tool name",
                None,
            ));
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return auth_required(id, None);
        };
        let ctx = match self.resolver.resolve(token).await {
            Ok(ctx) => ctx,
            Err(e) if e.is_forbidden() => {
                debug!(tool = name, "forbidden caller: {e}");
                let err = crmcp_core::crm::CrmError::forbidden(e.to_string());
                return Dispatch::Reply(JsonRpcResponse::error(
                    id,
                    TOOL_ERROR,
                    err.message.clone(),
                    Some(err.to_value()),
                ));
            }
            Err(e) if e.is_internal() => {
                warn!(tool = name, "identity resolution failed: {e}");
                let err = crmcp_core::crm::CrmError::internal("Identity lookup failed");
                return Dispatch::Reply(JsonRpcResponse::error(
                    id,
                    TOOL_ERROR,
                    err.message.clone(),
                    Some(err.to_value()),
                ));
            }
            Err(e) => {
                debug!(tool = name, "unauthenticated tool call: {e}");
                return auth_required(id, Some(e.to_string()));
            }
        };

        match self.invoker.call(&ctx, name, arguments).await {
            Ok(result) => {
                let text = serde_json::to_string(&result).unwrap_or_else(|_| "null".to_string());
                Dispatch::Reply(JsonRpcResponse::success(
                    id,
                    json!({ "content": [{ "type": "text", "text": text }] }),
                ))
            }
            Err(e) => {
                if e.code == ErrorCode::InternalError {
                    warn!(tool = name, "tool call failed internally: {}", e.message);
                }
                Dispatch::Reply(JsonRpcResponse::error(
                    id,
                    TOOL_ERROR,
                    e.message.clone(),
                    Some(e.to_value()),
                ))
            }
        }
    }
}

fn auth_required(id: Value, reason: Option<String>) -> Dispatch {
    Dispatch::AuthRequired(JsonRpcResponse::error(
        id,
        AUTH_REQUIRED,
        "Authentication required",
        reason.map(|r| json!({ "reason": r })),
    ))
}

#[cfg(test)]
mod tests;
