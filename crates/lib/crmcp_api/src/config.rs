//! API server configuration.

use crmcp_core::auth::ClaimExpectations;
use crmcp_core::auth::jwt::resolve_session_secret;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL. `None` runs on in-memory stores.
    pub database_url: Option<String>,
    /// Externally visible origin, used in discovery documents and challenges.
    pub public_base_url: String,
    /// Human sign-in surface the authorize endpoint redirects to.
    pub sign_in_url: String,
    /// Expected `iss` claim of bearer tokens.
    pub token_issuer: String,
    /// Expected `aud` claim of bearer tokens.
    pub token_audience: String,
    /// Scope reported by discovery and the token endpoint.
    pub oauth_scope: String,
    /// Require a matching code verifier when a PKCE challenge was stored.
    pub enforce_pkce: bool,
    /// HS256 secret for platform session tokens.
    pub platform_session_secret: String,
    pub bootstrap_tenant_name: String,
    pub bootstrap_admin_email: Option<String>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                  | Default                               |
    /// |---------------------------|---------------------------------------|
    /// | `BIND_ADDR`               | `127.0.0.1:3100`                      |
    /// | `DATABASE_URL`            | unset (in-memory stores)              |
    /// | `PUBLIC_BASE_URL`         | `http://localhost:3100`               |
    /// | `SIGN_IN_URL`             | `<PUBLIC_BASE_URL>/sign-in`           |
    /// | `TOKEN_ISSUER`            | `<PUBLIC_BASE_URL>`                   |
    /// | `TOKEN_AUDIENCE`          | `crmcp`                               |
    /// | `OAUTH_SCOPE`             | `crm`                                 |
    /// | `OAUTH_ENFORCE_PKCE`      | `false`                               |
    /// | `PLATFORM_SESSION_SECRET` | generated & persisted to file         |
    /// | `BOOTSTRAP_TENANT_NAME`   | `Default`                             |
    /// | `BOOTSTRAP_ADMIN_EMAIL`   | unset                                 |
    pub fn from_env() -> Self {
        let public_base_url = env_or("PUBLIC_BASE_URL", "http://localhost:3100")
            .trim_end_matches('/')
            .to_string();
        Self {
            bind_addr: env_or("BIND_ADDR", "127.0.0.1:3100"),
            database_url: env_opt("DATABASE_URL"),
            sign_in_url: env_opt("SIGN_IN_URL")
                .unwrap_or_else(|| format!("{public_base_url}/sign-in")),
            token_issuer: env_opt("TOKEN_ISSUER").unwrap_or_else(|| public_base_url.clone()),
            token_audience: env_or("TOKEN_AUDIENCE", "crmcp"),
            oauth_scope: env_or("OAUTH_SCOPE", "crm"),
            enforce_pkce: env_opt("OAUTH_ENFORCE_PKCE").is_some_and(|v| parse_flag(&v)),
            platform_session_secret: resolve_session_secret(),
            bootstrap_tenant_name: env_or("BOOTSTRAP_TENANT_NAME", "Default"),
            bootstrap_admin_email: env_opt("BOOTSTRAP_ADMIN_EMAIL"),
            public_base_url,
        }
    }

    pub fn claim_expectations(&self) -> ClaimExpectations {
        ClaimExpectations {
            issuer: self.token_issuer.clone(),
            audience: self.token_audience.clone(),
        }
    }

    /// Absolute URL of `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.public_base_url)
    }

    /// Protected-resource metadata URL named in `WWW-Authenticate` challenges.
    pub fn resource_metadata_url(&self) -> String {
        self.url("/.well-known/oauth-protected-resource")
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
