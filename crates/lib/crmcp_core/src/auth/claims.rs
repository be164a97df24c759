// @zen-component: AUTH-TokenCodec
//
//! Bearer token claim decoding and validation.
//!
//! Tokens are compact three-segment credentials issued by the upstream
//! identity authority. Only the claim set is decoded here; the signature is
//! NOT verified locally. The issuer is trusted to have done so, and these
//! checks only guard against tokens that are malformed, stale, or minted for
//! another issuer or audience.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Structural decoding failure. Never carries a partial claim set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed token")]
    MalformedToken,
}

/// Claim validation failure with a stable reason string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct InvalidClaims {
    pub reason: &'static str,
}

/// `aud` may be a single string or a list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    fn matches(&self, expected: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == expected,
            Audience::Multiple(auds) => auds.iter().any(|a| a == expected),
        }
    }
}

/// Claims consumed from a bearer token.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// `"<userId>|<sessionId>"`.
    pub sub: Option<String>,
    pub email: Option<String>,
    /// Expiry, epoch seconds.
    pub exp: Option<i64>,
    pub iss: Option<String>,
    pub aud: Option<Audience>,
}

impl Claims {
    /// Durable user id: the part of `sub` before the first `|`.
    pub fn user_id(&self) -> Option<&str> {
        let sub = self.sub.as_deref()?;
        let id = sub.split_once('|').map_or(sub, |(id, _)| id);
        (!id.is_empty()).then_some(id)
    }
}

/// Expected issuer and audience, loaded once from configuration.
#[derive(Debug, Clone)]
pub struct ClaimExpectations {
    pub issuer: String,
    pub audience: String,
}

/// Decode the claim set carried in the middle segment of `token`.
pub fn decode_claims(token: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::MalformedToken);
    }

    let payload = decode_segment(segments[1])?;
    serde_json::from_slice(&payload).map_err(|_| DecodeError::MalformedToken)
}

/// Base64url segment → bytes, repairing alphabet and padding.
fn decode_segment(segment: &str) -> Result<Vec<u8>, DecodeError> {
    let mut repaired: String = segment
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    while repaired.len() % 4 != 0 {
        repaired.push('=');
    }
    STANDARD
        .decode(repaired)
        .map_err(|_| DecodeError::MalformedToken)
}

/// Validate expiry, issuer and audience, in that order.
pub fn validate_claims(
    claims: &Claims,
    expected: &ClaimExpectations,
    now: DateTime<Utc>,
) -> Result<(), InvalidClaims> {
    match claims.exp {
        None => {
            return Err(InvalidClaims {
                reason: "missing expiration",
            });
        }
        Some(exp) if exp <= now.timestamp() => return Err(InvalidClaims { reason: "expired" }),
        Some(_) => {}
    }

    if claims.iss.as_deref() != Some(expected.issuer.as_str()) {
        return Err(InvalidClaims {
            reason: "invalid issuer",
        });
    }

    let audience_ok = claims
        .aud
        .as_ref()
        .is_some_and(|aud| aud.matches(&expected.audience));
    if !audience_ok {
        return Err(InvalidClaims {
            reason: "invalid audience",
        });
    }

    Ok(())
}
