//! PostgreSQL credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    CredentialError, CredentialStore, NewUser, Role, Tenant, User, UserUpdate, normalize_email,
};

type UserRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    bool,
    DateTime<Utc>,
);

const USER_COLUMNS: &str = "id::text, tenant_id::text, email, name, role, active, created_at";

fn user_from_row(row: UserRow) -> User {
    let (id, tenant_id, email, name, role, active, created_at) = row;
    User {
        id,
        tenant_id,
        email,
        name,
        role: Role::parse(&role).unwrap_or(Role::Member),
        active,
        created_at,
    }
}

/// Ids arrive from token claims and tool arguments; anything that is not a
/// UUID cannot match a row.
fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id).ok()
}

/// Tenants and users in the `tenants`/`users` tables.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, CredentialError> {
        let Some(id) = parse_id(user_id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CredentialError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn list_users(&self, tenant_id: &str) -> Result<Vec<User>, CredentialError> {
        let Some(tenant) = parse_id(tenant_id) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 ORDER BY created_at, id"
        ))
        .bind(tenant)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(user_from_row).collect())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, CredentialError> {
        let tenant = parse_id(&user.tenant_id)
            .ok_or_else(|| CredentialError::TenantNotFound(user.tenant_id.clone()))?;
        let email = normalize_email(&user.email);
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (tenant_id, email, name, role) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (email) DO NOTHING \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(tenant)
        .bind(&email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            let missing_tenant =
                matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation());
            if missing_tenant {
                CredentialError::TenantNotFound(user.tenant_id.clone())
            } else {
                CredentialError::DbError(e)
            }
        })?;
        row.map(user_from_row)
            .ok_or(CredentialError::DuplicateEmail(email))
    }

    async fn update_user(
        &self,
        tenant_id: &str,
        user_id: &str,
        update: UserUpdate,
    ) -> Result<Option<User>, CredentialError> {
        let (Some(tenant), Some(id)) = (parse_id(tenant_id), parse_id(user_id)) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET \
               name = COALESCE($3, name), \
               role = COALESCE($4, role), \
               active = COALESCE($5, active) \
             WHERE id = $1 AND tenant_id = $2 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(tenant)
        .bind(update.name)
        .bind(update.role.map(|r| r.as_str()))
        .bind(update.active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, CredentialError> {
        let Some(id) = parse_id(tenant_id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "SELECT id::text, name, created_at FROM tenants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name, created_at)| Tenant {
            id,
            name,
            created_at,
        }))
    }

    async fn insert_tenant(&self, name: &str) -> Result<Tenant, CredentialError> {
        let (id, name, created_at) = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "INSERT INTO tenants (name) VALUES ($1) RETURNING id::text, name, created_at",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(Tenant {
            id,
            name,
            created_at,
        })
    }

    async fn update_tenant(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<Tenant>, CredentialError> {
        let Some(id) = parse_id(tenant_id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "UPDATE tenants SET name = $2 WHERE id = $1 RETURNING id::text, name, created_at",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name, created_at)| Tenant {
            id,
            name,
            created_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_uuid_ids_never_match() {
        assert!(parse_id("user_abc").is_none());
        assert!(parse_id("").is_none());
        assert!(parse_id("6f1c1a8e-0a5b-4c4e-9f59-0b7d2f3c6a11").is_some());
    }

    #[test]
    fn unknown_role_reads_as_member() {
        let user = user_from_row((
            "u".into(),
            "t".into(),
            "a@b.c".into(),
            None,
            "owner".into(),
            true,
            Utc::now(),
        ));
        assert_eq!(user.role, Role::Member);
    }
}
