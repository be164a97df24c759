//! PostgreSQL ephemeral stores.
//!
//! Single-use reads are one `DELETE ... RETURNING` statement, so two
//! concurrent redemptions of the same code cannot both observe it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{
    AuthorizationCode, CodeStore, Expiring, McpSession, PkceChallenge, PkceStore, SessionStore,
    StoreError,
};
use crate::auth::pkce::ChallengeMethod;

type ChallengeRow = (String, String, String, String, DateTime<Utc>, DateTime<Utc>);
type CodeRow = (String, String, String, DateTime<Utc>, DateTime<Utc>);
type SessionRow = (String, String, DateTime<Utc>, DateTime<Utc>);

fn challenge_from_row(row: ChallengeRow) -> PkceChallenge {
    let (state, code_challenge, method, redirect_uri, created_at, expires_at) = row;
    let parsed = ChallengeMethod::parse(Some(&method));
    PkceChallenge {
        state,
        code_challenge,
        code_challenge_method: parsed.unwrap_or(ChallengeMethod::S256),
        redirect_uri,
        created_at,
        expires_at,
    }
}

fn code_from_row(row: CodeRow) -> AuthorizationCode {
    let (code, token, state, created_at, expires_at) = row;
    AuthorizationCode {
        code,
        token,
        state,
        created_at,
        expires_at,
    }
}

fn session_from_row(row: SessionRow) -> McpSession {
    let (session_id, token, created_at, expires_at) = row;
    McpSession {
        session_id,
        token,
        created_at,
        expires_at,
    }
}

async fn sweep_table(pool: &PgPool, table: &str, now: DateTime<Utc>) -> Result<u64, StoreError> {
    let result = sqlx::query(&format!("DELETE FROM {table} WHERE expires_at <= $1"))
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Challenges in `oauth_pkce_challenges`.
#[derive(Clone)]
pub struct PgPkceStore {
    pool: PgPool,
}

impl PgPkceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PkceStore for PgPkceStore {
    async fn store(&self, challenge: PkceChallenge) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO oauth_pkce_challenges \
               (state, code_challenge, code_challenge_method, redirect_uri, \
                created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (state) DO UPDATE SET \
               code_challenge = EXCLUDED.code_challenge, \
               code_challenge_method = EXCLUDED.code_challenge_method, \
               redirect_uri = EXCLUDED.redirect_uri, \
               created_at = EXCLUDED.created_at, \
               expires_at = EXCLUDED.expires_at",
        )
        .bind(&challenge.state)
        .bind(&challenge.code_challenge)
        .bind(challenge.code_challenge_method.as_str())
        .bind(&challenge.redirect_uri)
        .bind(challenge.created_at)
        .bind(challenge.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take(
        &self,
        state: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PkceChallenge>, StoreError> {
        let row = sqlx::query_as::<_, ChallengeRow>(
            "DELETE FROM oauth_pkce_challenges WHERE state = $1 \
             RETURNING state, code_challenge, code_challenge_method, redirect_uri, \
                       created_at, expires_at",
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(challenge_from_row).filter(|c| !c.is_expired(now)))
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        sweep_table(&self.pool, "oauth_pkce_challenges", now).await
    }
}

/// Codes in `oauth_authorization_codes`.
#[derive(Clone)]
pub struct PgCodeStore {
    pool: PgPool,
}

impl PgCodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CodeStore for PgCodeStore {
    async fn insert(&self, code: AuthorizationCode) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO oauth_authorization_codes (code, token, state, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&code.code)
        .bind(&code.token)
        .bind(&code.state)
        .bind(code.created_at)
        .bind(code.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>, StoreError> {
        let row = sqlx::query_as::<_, CodeRow>(
            "DELETE FROM oauth_authorization_codes WHERE code = $1 \
             RETURNING code, token, state, created_at, expires_at",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(code_from_row).filter(|c| !c.is_expired(now)))
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        sweep_table(&self.pool, "oauth_authorization_codes", now).await
    }
}

/// Sessions in `mcp_sessions`.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: McpSession) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO mcp_sessions (session_id, token, created_at, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&session.session_id)
        .bind(&session.token)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<McpSession>, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT session_id, token, created_at, expires_at FROM mcp_sessions \
             WHERE session_id = $1 AND expires_at > $2",
        )
        .bind(session_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(session_from_row))
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        sweep_table(&self.pool, "mcp_sessions", now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge_with_method(method: &str) -> PkceChallenge {
        let now = Utc::now();
        let row = ("s".into(), "c".into(), method.into(), "r".into(), now, now);
        challenge_from_row(row)
    }

    #[test]
    fn stored_method_text_maps_back() {
        let plain = challenge_with_method("plain");
        assert_eq!(plain.code_challenge_method, ChallengeMethod::Plain);
        let s256 = challenge_with_method("S256");
        assert_eq!(s256.code_challenge_method, ChallengeMethod::S256);
        let unknown = challenge_with_method("md5");
        assert_eq!(unknown.code_challenge_method, ChallengeMethod::S256);
    }
}
