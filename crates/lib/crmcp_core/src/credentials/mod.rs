//! Tenant and user records.
//!
//! The credential store is the durable source of identities. Lookups are by
//! user id or by email; emails are compared case-insensitively.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryCredentialStore;
pub use pg::PgCredentialStore;

/// Credential store errors.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

/// User role within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "member" => Some(Role::Member),
            _ => None,
        }
    }
}

/// Isolation boundary; every identity and document belongs to one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Domain user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub tenant_id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub tenant_id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

/// Partial user update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

/// Durable tenant/user records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, CredentialError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CredentialError>;

    async fn list_users(&self, tenant_id: &str) -> Result<Vec<User>, CredentialError>;

    /// Insert a user. Fails with `DuplicateEmail` if the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, CredentialError>;

    /// Update a user within `tenant_id`. `None` when absent from that tenant.
    async fn update_user(
        &self,
        tenant_id: &str,
        user_id: &str,
        update: UserUpdate,
    ) -> Result<Option<User>, CredentialError>;

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, CredentialError>;

    async fn insert_tenant(&self, name: &str) -> Result<Tenant, CredentialError>;

    async fn update_tenant(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<Tenant>, CredentialError>;
}

/// Lowercase and trim an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Ensure a tenant and an active admin exist for `admin_email`.
///
/// Returns the admin user, creating the tenant and user on first run.
pub async fn bootstrap_admin(
    store: &dyn CredentialStore,
    tenant_name: &str,
    admin_email: &str,
) -> Result<User, CredentialError> {
    if let Some(existing) = store.find_user_by_email(admin_email).await? {
        return Ok(existing);
    }
    let tenant = store.insert_tenant(tenant_name).await?;
    store
        .insert_user(NewUser {
            tenant_id: tenant.id,
            email: admin_email.to_string(),
            name: None,
            role: Role::Admin,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Admin, Role::Member] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("owner"), None);
    }

    #[tokio::test]
    async fn bootstrap_admin_is_idempotent() {
        let store = MemoryCredentialStore::new();
        let first = bootstrap_admin(&store, "Acme", "root@acme.test")
            .await
            .unwrap();
        let second = bootstrap_admin(&store, "Acme", "root@acme.test")
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.role, Role::Admin);
        assert!(first.active);
        let tenant = store.get_tenant(&first.tenant_id).await.unwrap().unwrap();
        assert_eq!(tenant.name, "Acme");
    }
}
