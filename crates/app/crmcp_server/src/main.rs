//! crmcp server binary.
//!
//! `serve` (the default) runs the HTTP listener; `sweep` deletes expired
//! PKCE challenges, authorization codes and SSE sessions and is meant to be
//! run from cron. Without a database the server sweeps its in-memory stores
//! itself.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use crmcp_api::config::ApiConfig;
use crmcp_core::credentials::{
    CredentialStore, MemoryCredentialStore, PgCredentialStore, bootstrap_admin,
};
use crmcp_core::crm::{CrmService, DocumentStore, MemoryDocumentStore, PgDocumentStore};
use crmcp_core::ephemeral::EphemeralStores;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_LOG_FILTER: &str = "info,crmcp_api=debug,crmcp_core=debug,crmcp_mcp=debug";

/// How often the in-memory stores drop expired records.
const MEMORY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "crmcp_server", about = "Agent-facing CRM over MCP", version)]
struct Cli {
    /// PostgreSQL connection URL. Without one the server runs on in-memory
    /// stores and forgets everything on exit.
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5, global = true)]
    max_connections: u32,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// Address to listen on; overrides `BIND_ADDR`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Delete expired ephemeral credentials and print the counts as JSON.
    Sweep,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays machine-readable for `sweep`.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Sweep) => sweep(cli.database_url.as_deref(), cli.max_connections).await,
        Some(Command::Serve { bind }) => serve(cli.database_url, cli.max_connections, bind).await,
        None => serve(cli.database_url, cli.max_connections, None).await,
    }
}

async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    info!(max_connections, "connecting to PostgreSQL");
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
}

async fn sweep(
    database_url: Option<&str>,
    max_connections: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(url) = database_url else {
        return Err(
            "sweep needs DATABASE_URL; in-memory stores live only inside a running server".into(),
        );
    };
    let pool = connect(url, max_connections).await?;
    let report = EphemeralStores::postgres(pool)
        .sweep_expired(chrono::Utc::now())
        .await?;
    println!(
        "{}",
        serde_json::json!({
            "challenges": report.challenges,
            "codes": report.codes,
            "sessions": report.sessions,
        })
    );
    Ok(())
}

async fn serve(
    database_url: Option<String>,
    max_connections: u32,
    bind: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ApiConfig::from_env();
    if database_url.is_some() {
        config.database_url = database_url;
    }
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }

    let shutdown = CancellationToken::new();
    let (credentials, documents, stores): (
        Arc<dyn CredentialStore>,
        Arc<dyn DocumentStore>,
        EphemeralStores,
    ) = match &config.database_url {
        Some(url) => {
            let pool = connect(url, max_connections).await?;
            info!("running database migrations");
            crmcp_api::migrate(&pool).await?;
            (
                Arc::new(PgCredentialStore::new(pool.clone())),
                Arc::new(PgDocumentStore::new(pool.clone())),
                EphemeralStores::postgres(pool),
            )
        }
        None => {
            warn!("DATABASE_URL not set: using in-memory stores, nothing will persist");
            let stores = EphemeralStores::in_memory();
            spawn_memory_sweeper(stores.clone(), MEMORY_SWEEP_INTERVAL, shutdown.clone());
            (
                Arc::new(MemoryCredentialStore::new()),
                Arc::new(MemoryDocumentStore::new()),
                stores,
            )
        }
    };

    if let Some(email) = &config.bootstrap_admin_email {
        let admin =
            bootstrap_admin(credentials.as_ref(), &config.bootstrap_tenant_name, email).await?;
        info!(user_id = %admin.id, tenant_id = %admin.tenant_id, "bootstrap admin ready");
    }

    let bind_addr = config.bind_addr.clone();
    let public_base_url = config.public_base_url.clone();
    let service = CrmService::new(documents, credentials);
    let app = crmcp_api::router(crmcp_api::AppState::new(config, service, stores));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, public = %public_base_url, "crmcp listening");

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
            }
            shutdown.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

/// Periodically delete expired records from in-memory stores until
/// `shutdown` fires.
fn spawn_memory_sweeper(
    stores: EphemeralStores,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(every);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticks.tick() => {
                    if let Err(e) = stores.sweep_expired(chrono::Utc::now()).await {
                        warn!("expiry sweep failed: {e}");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use crmcp_core::ephemeral::{McpSession, SessionStore};

    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["crmcp_server"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_sweep_with_database_url() {
        let cli = Cli::try_parse_from([
            "crmcp_server",
            "sweep",
            "--database-url",
            "postgres://db/crm",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Command::Sweep)));
        assert_eq!(cli.database_url.as_deref(), Some("postgres://db/crm"));
    }

    #[test]
    fn parses_serve_bind_override() {
        let cli = Cli::try_parse_from(["crmcp_server", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Serve { bind: Some(ref b) }) if b == "0.0.0.0:8080"
        ));
    }

    #[tokio::test]
    async fn memory_sweeper_drops_expired_sessions_and_stops_on_shutdown() {
        let stores = EphemeralStores::in_memory();
        let stale = McpSession::open("T", chrono::Utc::now() - chrono::Duration::hours(2));
        let stale_id = stale.session_id.clone();
        stores.sessions.insert(stale).await.unwrap();
        let live = McpSession::open("T", chrono::Utc::now());
        let live_id = live.session_id.clone();
        stores.sessions.insert(live).await.unwrap();

        let shutdown = CancellationToken::new();
        let sweeper =
            spawn_memory_sweeper(stores.clone(), Duration::from_millis(10), shutdown.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The stale record is gone even for a reader whose clock ignores expiry.
        let long_ago = chrono::Utc::now() - chrono::Duration::days(1);
        let stale = stores.sessions.get(&stale_id, long_ago).await.unwrap();
        let live = stores.sessions.get(&live_id, long_ago).await.unwrap();
        assert!(stale.is_none());
        assert!(live.is_some());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
