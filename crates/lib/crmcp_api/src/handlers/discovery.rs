// @zen-component: OAUTH-Discovery
//
//! OAuth discovery documents (RFC 9728 protected resource, RFC 8414
//! authorization server). Both are unauthenticated.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::AppState;
use crate::config::ApiConfig;

/// `GET /.well-known/oauth-protected-resource`
pub async fn protected_resource_handler(State(state): State<AppState>) -> Json<Value> {
    Json(protected_resource(&state.config))
}

/// `GET /.well-known/oauth-authorization-server`
pub async fn authorization_server_handler(State(state): State<AppState>) -> Json<Value> {
    Json(authorization_server(&state.config))
}

pub fn protected_resource(config: &ApiConfig) -> Value {
    json!({
        "resource": config.url("/mcp"),
        "authorization_servers": [config.public_base_url],
        "scopes_supported": [config.oauth_scope],
        "bearer_methods_supported": ["header", "query"],
    })
}

pub fn authorization_server(config: &ApiConfig) -> Value {
    json!({
        "issuer": config.public_base_url,
        "authorization_endpoint": config.url("/oauth/authorize"),
        "token_endpoint": config.url("/oauth/token"),
        "registration_endpoint": config.url("/oauth/register"),
        "scopes_supported": [config.oauth_scope],
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        // `plain` is still accepted by the verifier but never advertised.
        "code_challenge_methods_supported": ["S256"],
        "token_endpoint_auth_methods_supported": ["none"],
    })
}
