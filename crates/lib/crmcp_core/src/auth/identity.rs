// @zen-component: AUTH-IdentityResolution
//
//! Identity resolution strategies.
//!
//! Both strategies produce the same [`AuthContext`]; which one runs is decided
//! by the transport that received the call, never by the caller.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::claims::{ClaimExpectations, decode_claims, validate_claims};
use super::jwt::verify_session_token;
use super::{AuthContext, AuthError};
use crate::credentials::{CredentialStore, User};

/// Turns a presented credential into an [`AuthContext`].
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, credential: &str) -> Result<AuthContext, AuthError>;
}

/// Resolves upstream bearer tokens (every MCP-originated call).
pub struct BearerTokenResolver {
    expectations: ClaimExpectations,
    credentials: Arc<dyn CredentialStore>,
}

impl BearerTokenResolver {
    pub fn new(expectations: ClaimExpectations, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            expectations,
            credentials,
        }
    }

    /// Look the user up by the id in `sub`, falling back to `email`.
    async fn find_user(
        &self,
        user_id: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, AuthError> {
        if let Some(id) = user_id {
            match self.credentials.get_user(id).await {
                Ok(Some(user)) => return Ok(Some(user)),
                Ok(None) => debug!(user_id = id, "no user for token subject, trying email"),
                Err(e) => debug!(user_id = id, "subject lookup failed, trying email: {e}"),
            }
        }
        match email {
            Some(email) => Ok(self.credentials.find_user_by_email(email).await?),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl IdentityResolver for BearerTokenResolver {
    async fn resolve(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = decode_claims(token)?;
        validate_claims(&claims, &self.expectations, Utc::now())?;

        let user = self
            .find_user(claims.user_id(), claims.email.as_deref())
            .await?
            .ok_or(AuthError::UserNotFound)?;

        AuthContext::for_user(user)
    }
}

/// Resolves platform session tokens for in-process calls from the companion
/// web application, whose users were already authenticated by the platform.
pub struct PlatformSessionResolver {
    secret: Vec<u8>,
    credentials: Arc<dyn CredentialStore>,
}

impl PlatformSessionResolver {
    pub fn new(secret: impl Into<Vec<u8>>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            secret: secret.into(),
            credentials,
        }
    }
}

#[async_trait]
impl IdentityResolver for PlatformSessionResolver {
    async fn resolve(&self, session: &str) -> Result<AuthContext, AuthError> {
        let claims = verify_session_token(session, &self.secret).ok_or(AuthError::InvalidSession)?;

        let user = self
            .credentials
            .get_user(&claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // A session minted for one tenant never grants access to another.
        if user.tenant_id != claims.tenant_id {
            return Err(AuthError::InvalidSession);
        }

        AuthContext::for_user(user)
    }
}
