//! # crmcp_api
//!
//! HTTP surface for crmcp: OAuth discovery and code exchange, the MCP
//! endpoint, the legacy SSE transport and the in-process tool endpoint.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use crmcp_core::auth::{BearerTokenResolver, IdentityResolver, PlatformSessionResolver};
use crmcp_core::credentials::CredentialStore;
use crmcp_core::crm::CrmService;
use crmcp_core::ephemeral::EphemeralStores;
use crmcp_mcp::{Dispatcher, ToolInvoker};
use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::handlers::{discovery, mcp, oauth, sse, tools};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    /// PKCE challenges, authorization codes and SSE sessions.
    pub stores: EphemeralStores,
    pub dispatcher: Dispatcher,
    pub invoker: ToolInvoker,
    /// Resolver for platform session tokens (`/api/tools`).
    pub platform: Arc<dyn IdentityResolver>,
}

impl AppState {
    /// Wire the dispatcher and both identity strategies around `service`.
    pub fn new(config: ApiConfig, service: CrmService, stores: EphemeralStores) -> Self {
        let credentials: Arc<dyn CredentialStore> = service.credentials().clone();
        let bearer =
            Arc::new(BearerTokenResolver::new(config.claim_expectations(), credentials.clone()));
        let platform = Arc::new(PlatformSessionResolver::new(
            config.platform_session_secret.as_bytes().to_vec(),
            credentials,
        ));
        let invoker = ToolInvoker::with_default_hooks(service);
        Self {
            config: Arc::new(config),
            stores,
            dispatcher: Dispatcher::new(bearer, invoker.clone()),
            invoker,
            platform,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `crmcp_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    crmcp_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let oauth_routes = Router::new()
        .route("/register", post(oauth::register_handler))
        .route("/authorize", get(oauth::authorize_handler))
        .route("/token", post(oauth::token_handler))
        .route("/code", post(oauth::mint_code_handler));

    // OPTIONS is answered by the CORS layer.
    let mcp_route = get(mcp::info_handler)
        .post(mcp::rpc_handler)
        .delete(mcp::delete_handler);

    // Trusted in-process calls from the companion web application.
    let trusted = Router::new()
        .route("/api/tools/{name}", post(tools::call_tool_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_platform_session,
        ));

    Router::new()
        .route(
            "/.well-known/oauth-protected-resource",
            get(discovery::protected_resource_handler),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            get(discovery::authorization_server_handler),
        )
        .nest("/oauth", oauth_routes.clone())
        .nest("/v1/oauth", oauth_routes)
        .route("/mcp", mcp_route.clone())
        .route("/v1/mcp", mcp_route)
        .route("/sse", get(sse::sse_handler))
        .route("/messages", post(sse::messages_handler))
        .merge(trusted)
        .layer(middleware::cors::cors_layer())
        .layer(axum::middleware::from_fn(middleware::cors::preflight_no_content))
        .with_state(state)
}
