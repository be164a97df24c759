// @zen-component: AUTH-AccessControl
//
//! Bearer token extraction and platform-session verification.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Uri};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::AppState;
use crate::config::ApiConfig;
use crate::error::AppError;

/// Bearer token presented with the request, if any.
///
/// Read from `Authorization: Bearer <token>`, falling back to the `token`
/// query parameter. Extraction never fails; handlers decide what a missing
/// token means.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BearerToken(pub Option<String>);

impl BearerToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self(header_token(&parts.headers).or_else(|| query_token(&parts.uri)))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

fn query_token(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// `WWW-Authenticate` challenge pointing at the protected-resource metadata.
pub fn www_authenticate(config: &ApiConfig) -> HeaderValue {
    let value = format!(
        "Bearer resource_metadata=\"{}\"",
        config.resource_metadata_url()
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("Bearer"))
}

/// Axum middleware for the in-process tool endpoint: verifies the platform
/// session token and injects the resulting `AuthContext` into request
/// extensions.
pub async fn require_platform_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = header_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing platform session".into()))?;

    let ctx = state.platform.resolve(&token).await.map_err(|e| {
        debug!("platform session rejected: {e}");
        AppError::from(e)
    })?;

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
