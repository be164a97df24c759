// @zen-component: CRM-Collaborator
//
//! Tenant-scoped CRM domain.
//!
//! Accounts, contacts, opportunities, tasks, reminders and the audit log are
//! documents in a generic tenant-scoped store. [`CrmService`] layers
//! validation, soft-delete and pagination on top and reports failures in the
//! domain error taxonomy that callers see verbatim.

pub mod entities;
pub mod inputs;
pub mod memory;
pub mod pg;
pub mod service;
pub mod store;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::auth::AuthError;
use crate::credentials::CredentialError;

pub use entities::{EntityKind, LinkKind, LinkedEntity, Stage};
pub use memory::MemoryDocumentStore;
pub use pg::PgDocumentStore;
pub use service::CrmService;
pub use store::{Document, DocumentPatch, DocumentStore, ListQuery, Page};

/// Domain error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    ValidationError,
    InvalidStage,
    DeletionHasDependencies,
    DuplicateInvite,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::InvalidStage => "INVALID_STAGE",
            ErrorCode::DeletionHasDependencies => "DELETION_HAS_DEPENDENCIES",
            ErrorCode::DuplicateInvite => "DUPLICATE_INVITE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Domain error `{code, message, details?}`.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct CrmError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl CrmError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Absent and other-tenant records are reported identically.
    pub fn not_found(label: &str, id: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{label} not found: {id}"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Serialize as the JSON error object returned to callers.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({ "code": self.code.as_str(), "message": self.message })
        })
    }
}

impl From<AuthError> for CrmError {
    fn from(e: AuthError) -> Self {
        if e.is_forbidden() {
            CrmError::forbidden(e.to_string())
        } else if e.is_internal() {
            CrmError::internal(e.to_string())
        } else {
            CrmError::unauthorized(e.to_string())
        }
    }
}

impl From<CredentialError> for CrmError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::DuplicateEmail(email) => CrmError::new(
                ErrorCode::DuplicateInvite,
                format!("A user with email {email} already exists"),
            ),
            CredentialError::TenantNotFound(id) => CrmError::not_found("Tenant", &id),
            CredentialError::DbError(e) => {
                warn!("credential store failure: {e}");
                CrmError::internal("Credential store failure")
            }
        }
    }
}

impl From<sqlx::Error> for CrmError {
    fn from(e: sqlx::Error) -> Self {
        warn!("document store failure: {e}");
        CrmError::internal("Document store failure")
    }
}
