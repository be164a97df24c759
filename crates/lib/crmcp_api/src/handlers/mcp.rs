// @zen-component: MCP-HttpTransport
//
//! Streamable-HTTP MCP endpoint: one JSON-RPC envelope per POST.

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{ACCEPT, LOCATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use crmcp_mcp::Dispatch;
use crmcp_mcp::dispatcher::{PROTOCOL_VERSION, SERVER_NAME};
use serde_json::json;
use tracing::debug;

use crate::AppState;
use crate::middleware::auth::{BearerToken, www_authenticate};

pub const MCP_SESSION_ID: &str = "mcp-session-id";
pub const MCP_PROTOCOL_VERSION: &str = "mcp-protocol-version";

/// `DELETE /mcp`: sessions are stateless, so there is nothing to end.
pub async fn delete_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// `GET /mcp`: browsers without a token go to sign-in, other clients get a
/// challenge; an authenticated GET returns server info.
pub async fn info_handler(
    State(state): State<AppState>,
    token: BearerToken,
    headers: HeaderMap,
) -> Response {
    if token.0.is_none() {
        let wants_html = headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"));
        if wants_html {
            let location = state.config.sign_in_url.clone();
            return (StatusCode::FOUND, [(LOCATION, location)]).into_response();
        }
        return unauthorized(&state);
    }

    let body = json!({
        "name": SERVER_NAME,
        "version": crmcp_mcp::version(),
        "protocolVersion": PROTOCOL_VERSION,
        "transport": "streamable-http",
    });
    with_mcp_headers(Json(body).into_response(), &headers)
}

/// `POST /mcp`
pub async fn rpc_handler(
    State(state): State<AppState>,
    token: BearerToken,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let token = token.as_deref();
    let dispatch = state.dispatcher.dispatch_bytes(&body, token).await;
    with_mcp_headers(dispatch_response(&state, dispatch), &headers)
}

/// `401 {error, message}` with a `WWW-Authenticate` challenge.
pub fn unauthorized(state: &AppState) -> Response {
    let body = json!({
        "error": "unauthorized",
        "message": "Authentication required. \
                    Obtain a token via the OAuth flow advertised in WWW-Authenticate.",
    });
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, www_authenticate(&state.config))],
        Json(body),
    )
        .into_response()
}

/// Turn a dispatch outcome into an HTTP response. Shared with `/messages`.
pub fn dispatch_response(state: &AppState, dispatch: Dispatch) -> Response {
    let status = dispatch.status();
    match dispatch {
        Dispatch::Accepted => (status, Body::empty()).into_response(),
        Dispatch::AuthRequired(envelope) => {
            debug!("tool call without usable token");
            (
                status,
                [(WWW_AUTHENTICATE, www_authenticate(&state.config))],
                Json(envelope),
            )
                .into_response()
        }
        Dispatch::Reply(envelope) | Dispatch::BadRequest(envelope) => {
            (status, Json(envelope)).into_response()
        }
    }
}

/// Echo the client's session id (or mint one) and announce the protocol
/// revision.
pub fn with_mcp_headers(mut response: Response, request_headers: &HeaderMap) -> Response {
    let session = request_headers
        .get(MCP_SESSION_ID)
        .cloned()
        .or_else(new_session_id);
    let headers = response.headers_mut();
    if let Some(session) = session {
        headers.insert(MCP_SESSION_ID, session);
    }
    headers.insert(
        MCP_PROTOCOL_VERSION,
        HeaderValue::from_static(PROTOCOL_VERSION),
    );
    response
}

fn new_session_id() -> Option<HeaderValue> {
    HeaderValue::from_str(&uuid::Uuid::new_v4().simple().to_string()).ok()
}
