// @zen-component: OAUTH-EphemeralStores
//
//! Expiring credential relations used by the OAuth bridge and the legacy SSE
//! transport.
//!
//! Three independent relations share one lifecycle: created with an expiry,
//! read at most once (challenges and codes are deleted by the read that
//! finds them), or removed by an explicitly invoked sweep. Expiry is always
//! re-checked at read time, so a record past `expires_at` is absent whether
//! or not the sweep has run.

pub mod memory;
pub mod pg;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use crate::auth::opaque_token;
use crate::auth::pkce::{ChallengeMethod, verify_challenge};

pub use memory::MemoryStore;
pub use pg::{PgCodeStore, PgPkceStore, PgSessionStore};

/// PKCE challenge lifetime: 10 minutes.
pub const PKCE_CHALLENGE_TTL_SECS: i64 = 10 * 60;

/// Authorization code lifetime: 5 minutes.
pub const AUTHORIZATION_CODE_TTL_SECS: i64 = 5 * 60;

/// Legacy SSE session lifetime: 1 hour.
pub const MCP_SESSION_TTL_SECS: i64 = 60 * 60;

const AUTHORIZATION_CODE_LEN: usize = 32;
const SESSION_ID_LEN: usize = 24;

/// Ephemeral store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

/// Records that carry an absolute expiry.
pub trait Expiring {
    fn expires_at(&self) -> DateTime<Utc>;

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() <= now
    }
}

/// One pending authorization attempt, keyed by `state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_method: ChallengeMethod,
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PkceChallenge {
    pub fn new(
        state: &str,
        code_challenge: &str,
        code_challenge_method: ChallengeMethod,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            state: state.to_string(),
            code_challenge: code_challenge.to_string(),
            code_challenge_method,
            redirect_uri: redirect_uri.to_string(),
            created_at: now,
            expires_at: now + Duration::seconds(PKCE_CHALLENGE_TTL_SECS),
        }
    }
}

impl Expiring for PkceChallenge {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Single-use code bound to a bearer token and the original `state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub token: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationCode {
    /// Issue a fresh random code for `token`.
    pub fn issue(token: &str, state: &str, now: DateTime<Utc>) -> Self {
        Self {
            code: opaque_token(AUTHORIZATION_CODE_LEN),
            token: token.to_string(),
            state: state.to_string(),
            created_at: now,
            expires_at: now + Duration::seconds(AUTHORIZATION_CODE_TTL_SECS),
        }
    }
}

impl Expiring for AuthorizationCode {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Legacy SSE session id → bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpSession {
    pub session_id: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl McpSession {
    /// Open a session with a fresh random id for `token`.
    pub fn open(token: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: opaque_token(SESSION_ID_LEN),
            token: token.to_string(),
            created_at: now,
            expires_at: now + Duration::seconds(MCP_SESSION_TTL_SECS),
        }
    }
}

impl Expiring for McpSession {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// PKCE challenges keyed by `state`.
#[async_trait]
pub trait PkceStore: Send + Sync {
    /// Store a challenge, replacing any prior record for the same state.
    async fn store(&self, challenge: PkceChallenge) -> Result<(), StoreError>;

    /// Remove and return the live challenge for `state`.
    async fn take(
        &self,
        state: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PkceChallenge>, StoreError>;

    /// Delete expired challenges, returning how many were removed.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Authorization codes keyed by code.
#[async_trait]
pub trait CodeStore: Send + Sync {
    async fn insert(&self, code: AuthorizationCode) -> Result<(), StoreError>;

    /// Remove the code and return it if it was still live. The record is
    /// deleted even when it turns out to be expired.
    async fn take(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>, StoreError>;

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// SSE sessions keyed by session id. Reads do not consume the session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: McpSession) -> Result<(), StoreError>;

    async fn get(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<McpSession>, StoreError>;

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Result of an expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub challenges: u64,
    pub codes: u64,
    pub sessions: u64,
}

/// The three relations, bundled for the protocol layer.
#[derive(Clone)]
pub struct EphemeralStores {
    pub challenges: Arc<dyn PkceStore>,
    pub codes: Arc<dyn CodeStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl EphemeralStores {
    pub fn in_memory() -> Self {
        Self {
            challenges: Arc::new(MemoryStore::<PkceChallenge>::new()),
            codes: Arc::new(MemoryStore::<AuthorizationCode>::new()),
            sessions: Arc::new(MemoryStore::<McpSession>::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            challenges: Arc::new(PgPkceStore::new(pool.clone())),
            codes: Arc::new(PgCodeStore::new(pool.clone())),
            sessions: Arc::new(PgSessionStore::new(pool)),
        }
    }

    /// Delete every expired record. Meant to be invoked by an external scheduler.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let report = SweepReport {
            challenges: self.challenges.sweep(now).await?,
            codes: self.codes.sweep(now).await?,
            sessions: self.sessions.sweep(now).await?,
        };
        info!(
            challenges = report.challenges,
            codes = report.codes,
            sessions = report.sessions,
            "swept expired ephemeral credentials"
        );
        Ok(report)
    }
}

/// Outcome of checking a code verifier against the challenge for a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkceOutcome {
    /// No live challenge exists for the state.
    NotRequired,
    Verified,
    Mismatch,
}

/// Consume the challenge for `state` and check `verifier` against it.
///
/// A second call for the same state finds nothing and reports `NotRequired`.
pub async fn verify_pkce(
    store: &dyn PkceStore,
    state: &str,
    verifier: Option<&str>,
    now: DateTime<Utc>,
) -> Result<PkceOutcome, StoreError> {
    let Some(challenge) = store.take(state, now).await? else {
        return Ok(PkceOutcome::NotRequired);
    };
    let Some(verifier) = verifier else {
        return Ok(PkceOutcome::Mismatch);
    };
    if verify_challenge(
        challenge.code_challenge_method,
        &challenge.code_challenge,
        verifier,
    ) {
        Ok(PkceOutcome::Verified)
    } else {
        Ok(PkceOutcome::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::pkce::compute_code_challenge;

    #[tokio::test]
    async fn verify_pkce_consumes_challenge() {
        let stores = EphemeralStores::in_memory();
        let challenges = stores.challenges.as_ref();
        let now = Utc::now();
        let challenge = compute_code_challenge("verifier-123");
        let pending =
            PkceChallenge::new("s", &challenge, ChallengeMethod::S256, "https://x/cb", now);
        challenges.store(pending).await.unwrap();

        let first = verify_pkce(challenges, "s", Some("verifier-123"), now)
            .await
            .unwrap();
        assert_eq!(first, PkceOutcome::Verified);

        let second = verify_pkce(challenges, "s", Some("anything"), now)
            .await
            .unwrap();
        assert_eq!(second, PkceOutcome::NotRequired);
    }

    #[tokio::test]
    async fn verify_pkce_reports_mismatch_and_missing_verifier() {
        let stores = EphemeralStores::in_memory();
        let challenges = stores.challenges.as_ref();
        let now = Utc::now();
        for state in ["a", "b"] {
            let pending =
                PkceChallenge::new(state, "abc", ChallengeMethod::Plain, "https://x/cb", now);
            challenges.store(pending).await.unwrap();
        }
        let wrong = verify_pkce(challenges, "a", Some("abd"), now)
            .await
            .unwrap();
        assert_eq!(wrong, PkceOutcome::Mismatch);
        let missing = verify_pkce(challenges, "b", None, now).await.unwrap();
        assert_eq!(missing, PkceOutcome::Mismatch);
    }

    #[tokio::test]
    async fn sweep_reports_per_relation_counts() {
        let stores = EphemeralStores::in_memory();
        let long_ago = Utc::now() - Duration::hours(2);
        let now = Utc::now();

        let stale = PkceChallenge::new("old", "c", ChallengeMethod::S256, "https://x/cb", long_ago);
        stores.challenges.store(stale).await.unwrap();
        stores
            .codes
            .insert(AuthorizationCode::issue("T", "old", long_ago))
            .await
            .unwrap();
        stores
            .codes
            .insert(AuthorizationCode::issue("T", "fresh", now))
            .await
            .unwrap();
        stores
            .sessions
            .insert(McpSession::open("T", long_ago - Duration::hours(1)))
            .await
            .unwrap();

        let report = stores.sweep_expired(now).await.unwrap();
        let expected = SweepReport {
            challenges: 1,
            codes: 1,
            sessions: 1,
        };
        assert_eq!(report, expected);
        let again = stores.sweep_expired(now).await.unwrap();
        assert_eq!(again, SweepReport::default());
    }

    #[test]
    fn lifetimes_match_relation() {
        let now = Utc::now();
        let challenge = PkceChallenge::new("s", "c", ChallengeMethod::S256, "r", now);
        let challenge_ttl = challenge.expires_at - challenge.created_at;
        assert_eq!(challenge_ttl, Duration::minutes(10));
        let code = AuthorizationCode::issue("T", "s", now);
        assert_eq!(code.expires_at - code.created_at, Duration::minutes(5));
        assert_eq!(code.code.len(), AUTHORIZATION_CODE_LEN);
        let session = McpSession::open("T", now);
        assert_eq!(session.expires_at - session.created_at, Duration::hours(1));
        assert!(!session.is_expired(now));
        assert!(session.is_expired(session.expires_at));
    }
}
