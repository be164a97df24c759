//! Platform session tokens.
//!
//! The companion web application signs short-lived HS256 session tokens for
//! users it has already authenticated. Unlike upstream bearer tokens, these
//! are fully verified here because the signing secret is shared.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AuthError;

/// Platform session lifetime: 15 minutes.
pub const SESSION_TOKEN_EXPIRY_SECS: i64 = 15 * 60;

/// Claims embedded in platform session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Tenant the session was opened for.
    pub tenant_id: String,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

/// Generate a signed platform session token (HS256, 15 min expiry).
pub fn generate_session_token(
    user_id: &str,
    tenant_id: &str,
    secret: &[u8],
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: user_id.to_string(),
        tenant_id: tenant_id.to_string(),
        exp: (now + Duration::seconds(SESSION_TOKEN_EXPIRY_SECS)).timestamp(),
        iat: now.timestamp(),
    };
    let key = EncodingKey::from_secret(secret);
    sign(&claims, &Header::default(), &key)
}

fn sign(claims: &SessionClaims, header: &Header, key: &EncodingKey) -> Result<String, AuthError> {
    encode(header, claims, key).map_err(|e| AuthError::Token(e.to_string()))
}

/// Verify a platform session token, returning the claims on success.
pub fn verify_session_token(token: &str, secret: &[u8]) -> Option<SessionClaims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<SessionClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}

/// Resolve the platform session secret: env var `PLATFORM_SESSION_SECRET` → persisted file.
pub fn resolve_session_secret() -> String {
    if let Ok(secret) = std::env::var("PLATFORM_SESSION_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = session_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new platform session secret");
    secret
}

/// Path to the persisted platform session secret file.
fn session_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crmcp")
        .join("platform-session-secret")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_round_trips_with_same_secret() {
        let token = generate_session_token("u1", "t1", b"secret").unwrap();
        let claims = verify_session_token(&token, b"secret").expect("valid token");
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.tenant_id, "t1");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn session_token_rejected_with_other_secret() {
        let token = generate_session_token("u1", "t1", b"secret").unwrap();
        assert!(verify_session_token(&token, b"other").is_none());
    }

    #[test]
    fn signing_failure_is_a_token_error() {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: "u1".into(),
            tenant_id: "t1".into(),
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };
        // an HMAC key cannot sign an RSA header
        let err = sign(
            &claims,
            &Header::new(jsonwebtoken::Algorithm::RS256),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::Token(_)));
        assert!(err.is_internal());
        assert!(err.to_string().starts_with("Token signing failed"));
    }

    #[test]
    fn expired_session_token_rejected() {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: "u1".into(),
            tenant_id: "t1".into(),
            exp: (now - Duration::hours(1)).timestamp(),
            iat: (now - Duration::hours(2)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(verify_session_token(&token, b"secret").is_none());
    }
}
