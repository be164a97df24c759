// @zen-component: OAUTH-AuthorizationFlow
//
//! OAuth 2.1 authorization-code bridge.
//!
//! The server never signs users in itself. `authorize` parks the PKCE
//! challenge and sends the browser to the sign-in surface; that application
//! posts the upstream bearer token back to `code`, and the AI client trades
//! the resulting one-time code for the same token at `token`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use crmcp_core::auth::opaque_token;
use crmcp_core::auth::pkce::ChallengeMethod;
use crmcp_core::ephemeral::{AuthorizationCode, PkceChallenge, PkceOutcome, verify_pkce};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use crate::AppState;
use crate::error::OAuthError;

/// Lifetime reported to clients; the token's own `exp` is what is enforced.
pub const ACCESS_TOKEN_EXPIRES_IN: u64 = 3600;

const CLIENT_ID_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Dynamic client registration request. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    pub client_name: Option<String>,
    pub grant_types: Option<Vec<String>>,
    pub response_types: Option<Vec<String>>,
}

/// `POST /oauth/register`: issue a public client id. Nothing is persisted.
pub async fn register_handler(body: Option<Json<RegisterRequest>>) -> impl IntoResponse {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let client_id = opaque_token(CLIENT_ID_LEN);
    info!(client_name = ?request.client_name, "registered OAuth client");

    let mut response = json!({
        "client_id": client_id,
        "client_secret": "",
        "client_id_issued_at": Utc::now().timestamp(),
        "client_secret_expires_at": 0,
        "redirect_uris": request.redirect_uris,
        "grant_types": request
            .grant_types
            .unwrap_or_else(|| vec!["authorization_code".into(), "refresh_token".into()]),
        "response_types": request.response_types.unwrap_or_else(|| vec!["code".into()]),
        "token_endpoint_auth_method": "none",
    });
    if let (Some(name), Some(map)) = (request.client_name, response.as_object_mut()) {
        map.insert("client_name".into(), Value::String(name));
    }
    (StatusCode::CREATED, Json(response))
}

// ---------------------------------------------------------------------------
// Authorize
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub client_id: Option<String>,
    pub response_type: Option<String>,
    pub scope: Option<String>,
}

/// `GET /oauth/authorize`: park the PKCE challenge and redirect (302) to the
/// sign-in surface.
pub async fn authorize_handler(
    State(state): State<AppState>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Response, OAuthError> {
    let redirect_uri = params
        .redirect_uri
        .as_deref()
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest("redirect_uri is required".into()))?;

    let method = ChallengeMethod::parse(params.code_challenge_method.as_deref())
        .ok_or_else(|| OAuthError::InvalidRequest("unsupported code_challenge_method".into()))?;

    if let (Some(oauth_state), Some(challenge)) = (&params.state, &params.code_challenge) {
        let pending = PkceChallenge::new(oauth_state, challenge, method, redirect_uri, Utc::now());
        state.stores.challenges.store(pending).await?;
        debug!(client_id = ?params.client_id, "stored PKCE challenge");
    }

    let mut target = Url::parse(&state.config.sign_in_url)
        .map_err(|e| OAuthError::ServerError(format!("invalid sign-in URL: {e}")))?;
    {
        let mut query = target.query_pairs_mut();
        query.append_pair("redirect_uri", redirect_uri);
        if let Some(s) = &params.state {
            query.append_pair("state", s);
        }
        if let Some(challenge) = &params.code_challenge {
            query.append_pair("code_challenge", challenge);
            query.append_pair("code_challenge_method", method.as_str());
        }
        if let Some(scope) = &params.scope {
            query.append_pair("scope", scope);
        }
    }

    Ok((StatusCode::FOUND, [(LOCATION, target.to_string())]).into_response())
}

// ---------------------------------------------------------------------------
// Code mint
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MintCodeRequest {
    pub token: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MintCodeResponse {
    pub code: String,
}

/// `POST /oauth/code`: called by the sign-in application with the user's
/// bearer token; returns a one-time authorization code.
pub async fn mint_code_handler(
    State(state): State<AppState>,
    Json(body): Json<MintCodeRequest>,
) -> Result<Json<MintCodeResponse>, OAuthError> {
    let token = body
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest("token is required".into()))?;

    let oauth_state = body.state.as_deref().unwrap_or_default();
    let code = AuthorizationCode::issue(&token, oauth_state, Utc::now());
    let response = MintCodeResponse {
        code: code.code.clone(),
    };
    state.stores.codes.insert(code).await?;
    info!("issued authorization code");
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// Token exchange
// ---------------------------------------------------------------------------

/// Token endpoint parameters, from a form or a JSON body.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
}

impl TokenRequest {
    /// Parse `body` as JSON when the content type says so, otherwise as
    /// `application/x-www-form-urlencoded`.
    pub fn parse(headers: &HeaderMap, body: &[u8]) -> Result<Self, OAuthError> {
        let is_json = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        if is_json {
            return serde_json::from_slice(body)
                .map_err(|e| OAuthError::InvalidRequest(format!("malformed JSON body: {e}")));
        }

        let mut request = Self::default();
        for (key, value) in url::form_urlencoded::parse(body) {
            let slot = match key.as_ref() {
                "grant_type" => &mut request.grant_type,
                "code" => &mut request.code,
                "code_verifier" => &mut request.code_verifier,
                "refresh_token" => &mut request.refresh_token,
                "redirect_uri" => &mut request.redirect_uri,
                "client_id" => &mut request.client_id,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }
        Ok(request)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: String,
    pub scope: String,
}

impl TokenResponse {
    fn bearer(token: String, scope: &str) -> Self {
        Self {
            access_token: token.clone(),
            token_type: "Bearer".into(),
            expires_in: ACCESS_TOKEN_EXPIRES_IN,
            refresh_token: token,
            scope: scope.to_string(),
        }
    }
}

/// `POST /oauth/token`
pub async fn token_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TokenResponse>, OAuthError> {
    let request = TokenRequest::parse(&headers, &body)?;
    match request.grant_type.as_deref() {
        Some("authorization_code") => exchange_code(&state, request).await.map(Json),
        Some("refresh_token") => {
            let token = request
                .refresh_token
                .filter(|t| !t.is_empty())
                .ok_or_else(|| OAuthError::InvalidRequest("refresh_token is required".into()))?;
            Ok(Json(TokenResponse::bearer(token, &state.config.oauth_scope)))
        }
        Some(other) => Err(OAuthError::UnsupportedGrantType(format!(
            "grant_type {other} is not supported"
        ))),
        None => Err(OAuthError::InvalidRequest("grant_type is required".into())),
    }
}

async fn exchange_code(
    state: &AppState,
    request: TokenRequest,
) -> Result<TokenResponse, OAuthError> {
    let code = request
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest("code is required".into()))?;

    let now = Utc::now();
    // The code is gone after this call whatever happens next.
    let Some(issued) = state.stores.codes.take(&code, now).await? else {
        debug!("authorization code unknown, expired or already used");
        return Err(OAuthError::InvalidGrant("Invalid or expired authorization code".into()));
    };

    if !issued.state.is_empty() {
        let challenges = state.stores.challenges.as_ref();
        if state.config.enforce_pkce {
            let verifier = request.code_verifier.as_deref();
            let outcome = verify_pkce(challenges, &issued.state, verifier, now).await?;
            if outcome == PkceOutcome::Mismatch {
                debug!("code verifier missing or wrong");
                return Err(OAuthError::InvalidGrant("PKCE verification failed".into()));
            }
        } else {
            challenges.take(&issued.state, now).await?;
        }
    }

    info!("exchanged authorization code for bearer token");
    Ok(TokenResponse::bearer(issued.token, &state.config.oauth_scope))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn parses_form_bodies() {
        let request = TokenRequest::parse(
            &HeaderMap::new(),
            b"grant_type=authorization_code&code=abc&code_verifier=v%2B1&ignored=x",
        )
        .unwrap();
        assert_eq!(request.grant_type.as_deref(), Some("authorization_code"));
        assert_eq!(request.code.as_deref(), Some("abc"));
        assert_eq!(request.code_verifier.as_deref(), Some("v+1"));
    }

    #[test]
    fn parses_json_bodies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        let request = TokenRequest::parse(
            &headers,
            br#"{"grant_type":"refresh_token","refresh_token":"t"}"#,
        )
        .unwrap();
        assert_eq!(request.refresh_token.as_deref(), Some("t"));

        let err = TokenRequest::parse(&headers, b"grant_type=x").unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
    }

    #[test]
    fn refresh_token_is_echoed() {
        let response = TokenResponse::bearer("tok".into(), "crm");
        assert_eq!(response.access_token, response.refresh_token);
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
    }
}
