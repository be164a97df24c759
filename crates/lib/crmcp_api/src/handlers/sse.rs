// @zen-component: MCP-SseTransport
//
//! Legacy HTTP+SSE transport.
//!
//! `GET /sse?token=...` binds the token to a short-lived session id and
//! announces `/messages?sessionId=...`; envelopes posted there are answered
//! in the HTTP response, not on the stream.

use std::convert::Infallible;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use crmcp_core::ephemeral::McpSession;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::mcp::{dispatch_response, unauthorized, with_mcp_headers};
use crate::AppState;
use crate::error::AppError;
use crate::middleware::auth::BearerToken;

/// Relative endpoint announced in the `endpoint` event.
pub fn messages_endpoint(session_id: &str) -> String {
    format!("/messages?sessionId={session_id}")
}

/// `GET /sse`
pub async fn sse_handler(State(state): State<AppState>, token: BearerToken) -> Response {
    let Some(token) = token.0 else {
        return unauthorized(&state);
    };

    let session = McpSession::open(&token, Utc::now());
    let session_id = session.session_id.clone();
    if let Err(e) = state.stores.sessions.insert(session).await {
        return AppError::from(e).into_response();
    }
    info!(session_id = %session_id, "opened SSE session");

    Sse::new(session_stream(&session_id))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// The two announcement frames, then an idle stream kept open by keep-alives.
fn session_stream(session_id: &str) -> impl Stream<Item = Result<Event, Infallible>> + use<> {
    let endpoint = Event::default()
        .event("endpoint")
        .data(messages_endpoint(session_id));
    let established = Event::default().event("message").data(
        json!({
            "jsonrpc": "2.0",
            "method": "notifications/connection_established",
            "params": { "sessionId": session_id },
        })
        .to_string(),
    );
    stream::iter([Ok(endpoint), Ok(established)]).chain(stream::pending())
}

#[derive(Debug, Deserialize)]
pub struct MessagesParams {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// `POST /messages?sessionId=...`: like `POST /mcp`, with the token taken
/// from the session and the request's own bearer token as fallback.
pub async fn messages_handler(
    State(state): State<AppState>,
    Query(params): Query<MessagesParams>,
    header_token: BearerToken,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(session_id) = params.session_id.filter(|s| !s.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_request", "message": "sessionId is required" })),
        )
            .into_response();
    };

    let token = match state.stores.sessions.get(&session_id, Utc::now()).await {
        Ok(Some(session)) => Some(session.token),
        Ok(None) => {
            debug!(session_id = %session_id, "unknown or expired SSE session, using request token");
            header_token.0
        }
        Err(e) => {
            warn!(session_id = %session_id, "session lookup failed: {e}");
            return AppError::from(e).into_response();
        }
    };

    let token = token.as_deref();
    let dispatch = state.dispatcher.dispatch_bytes(&body, token).await;
    with_mcp_headers(dispatch_response(&state, dispatch), &headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_names_the_session() {
        assert_eq!(messages_endpoint("abc"), "/messages?sessionId=abc");
    }
}
