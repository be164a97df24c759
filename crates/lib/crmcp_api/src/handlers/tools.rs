//! In-process tool endpoint for the companion web application.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use crmcp_core::auth::AuthContext;
use serde_json::Value;

use crate::AppState;
use crate::error::AppResult;

/// `POST /api/tools/{name}`: run a tool as the platform-session user.
/// The body is the tool's arguments object and may be omitted.
pub async fn call_tool_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(name): Path<String>,
    body: Option<Json<Value>>,
) -> AppResult<Json<Value>> {
    let arguments = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let result = state.invoker.call(&ctx, &name, arguments).await?;
    Ok(Json(result))
}
