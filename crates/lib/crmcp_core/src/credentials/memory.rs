//! In-memory credential store.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{
    CredentialError, CredentialStore, NewUser, Tenant, User, UserUpdate, normalize_email,
};

/// In-memory tenants and users keyed by id.
#[derive(Default)]
pub struct MemoryCredentialStore {
    tenants: DashMap<String, Tenant>,
    users: DashMap<String, User>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, CredentialError> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CredentialError> {
        let email = normalize_email(email);
        Ok(self
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.clone()))
    }

    async fn list_users(&self, tenant_id: &str) -> Result<Vec<User>, CredentialError> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| u.tenant_id == tenant_id)
            .map(|u| u.clone())
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, CredentialError> {
        if !self.tenants.contains_key(&user.tenant_id) {
            return Err(CredentialError::TenantNotFound(user.tenant_id));
        }
        let email = normalize_email(&user.email);
        if self.users.iter().any(|u| u.email == email) {
            return Err(CredentialError::DuplicateEmail(email));
        }
        let record = User {
            id: Uuid::new_v4().to_string(),
            tenant_id: user.tenant_id,
            email,
            name: user.name,
            role: user.role,
            active: true,
            created_at: Utc::now(),
        };
        self.users.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_user(
        &self,
        tenant_id: &str,
        user_id: &str,
        update: UserUpdate,
    ) -> Result<Option<User>, CredentialError> {
        let Some(mut user) = self.users.get_mut(user_id) else {
            return Ok(None);
        };
        if user.tenant_id != tenant_id {
            return Ok(None);
        }
        if let Some(name) = update.name {
            user.name = Some(name);
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(active) = update.active {
            user.active = active;
        }
        Ok(Some(user.clone()))
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, CredentialError> {
        Ok(self.tenants.get(tenant_id).map(|t| t.clone()))
    }

    async fn insert_tenant(&self, name: &str) -> Result<Tenant, CredentialError> {
        let tenant = Tenant {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(tenant)
    }

    async fn update_tenant(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<Tenant>, CredentialError> {
        Ok(self.tenants.get_mut(tenant_id).map(|mut t| {
            t.name = name.to_string();
            t.clone()
        }))
    }
}
