//! Authentication and identity.
//!
//! Provides bearer-token claim decoding, the two identity-resolution
//! strategies, platform session JWTs and PKCE helpers shared by `crmcp_api`
//! and `crmcp_mcp`.

pub mod claims;
pub mod identity;
pub mod jwt;
pub mod pkce;

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use thiserror::Error;

use crate::credentials::{CredentialError, Role, User};

pub use claims::{ClaimExpectations, Claims, DecodeError, InvalidClaims};
pub use identity::{BearerTokenResolver, IdentityResolver, PlatformSessionResolver};

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed token")]
    MalformedToken,

    #[error("Invalid token: {0}")]
    InvalidClaims(&'static str),

    #[error("User not found; sign in first")]
    UserNotFound,

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("Account is inactive")]
    Inactive,

    #[error("Credential store error: {0}")]
    Store(String),

    #[error("Token signing failed: {0}")]
    Token(String),
}

impl AuthError {
    /// True when the caller was identified but is not allowed in.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AuthError::Inactive)
    }

    /// True when the failure is on our side rather than the caller's.
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::Store(_) | AuthError::Token(_))
    }
}

impl From<DecodeError> for AuthError {
    fn from(_: DecodeError) -> Self {
        AuthError::MalformedToken
    }
}

impl From<InvalidClaims> for AuthError {
    fn from(e: InvalidClaims) -> Self {
        AuthError::InvalidClaims(e.reason)
    }
}

impl From<CredentialError> for AuthError {
    fn from(e: CredentialError) -> Self {
        AuthError::Store(e.to_string())
    }
}

/// Ambient identity for every CRM call made during one request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub tenant_id: String,
    pub role: Role,
    pub user: User,
}

impl AuthContext {
    /// Build a context for an active user. Inactive accounts are refused.
    pub fn for_user(user: User) -> Result<Self, AuthError> {
        if !user.active {
            return Err(AuthError::Inactive);
        }
        Ok(Self {
            user_id: user.id.clone(),
            tenant_id: user.tenant_id.clone(),
            role: user.role,
            user,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Generate a random opaque token of `len` alphanumeric characters.
///
/// Used for authorization codes, SSE session ids and client ids.
pub fn opaque_token(len: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
