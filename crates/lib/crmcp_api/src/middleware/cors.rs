//! CORS for browser-hosted MCP clients.

use axum::extract::Request;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderName, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::mcp::{MCP_PROTOCOL_VERSION, MCP_SESSION_ID};

/// Permissive CORS; the MCP and challenge headers are readable by scripts.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static(MCP_SESSION_ID),
            HeaderName::from_static(MCP_PROTOCOL_VERSION),
            WWW_AUTHENTICATE,
        ])
}

/// The CORS layer answers every `OPTIONS` itself with 200; answer 204 instead.
pub async fn preflight_no_content(request: Request, next: Next) -> Response {
    let preflight = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}
