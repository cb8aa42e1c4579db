//! Wallet ledger server.
//!
//! Serves the casino and sportsbook provider endpoints and the back-office API
//! over a PostgreSQL-backed ledger, or over the in-memory store with `--memory`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use ledger_server::{api, config::ServerConfig, logging, metrics};
use log::info;
use pico_args::Arguments;
use wallet_ledger::{
    collab::{
        AccountDirectory, MemoryAccountDirectory, MemoryTicketService, PgAccountDirectory,
        PgTicketService, TicketService,
    },
    db::Database,
    ledger::{LedgerStore, MemoryLedgerStore, PgLedgerStore},
};

const HELP: &str = "\
Run the wallet ledger server

USAGE:
  ledger_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  --memory                 Use the in-memory store (state is lost on exit)
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  CASINO_SECRET            HMAC secret shared with the casino provider
  CASINO_CURRENCY          Casino wallet currency [default: INR]
  SPORTSBOOK_CURRENCY      Sportsbook wallet currency [default: INR]
  METRICS_BIND             Prometheus listener (e.g., 127.0.0.1:9090)
  RUST_LOG                 Log filter
  (See .env file for all configuration options)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    memory: bool,
}

/// Storage and collaborators chosen at startup
struct Backend {
    store: Arc<dyn LedgerStore>,
    accounts: Arc<dyn AccountDirectory>,
    tickets: Arc<dyn TicketService>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        memory: pargs.contains("--memory"),
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url, args.memory)?;
    info!("Starting wallet ledger server at {}", config.bind);

    let backend = match &config.database {
        Some(db_config) => {
            info!("Connecting to database");
            let db = Database::new(db_config)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
            db.migrate()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
            info!("Database connected and migrated");

            let pool = db.shared_pool();
            Backend {
                store: Arc::new(PgLedgerStore::new(pool.clone())),
                accounts: Arc::new(PgAccountDirectory::new(pool.clone())),
                tickets: Arc::new(PgTicketService::new(pool)),
            }
        }
        None => {
            log::warn!("Running on the in-memory store; balances are lost on exit");
            Backend {
                store: Arc::new(MemoryLedgerStore::new()),
                accounts: Arc::new(MemoryAccountDirectory::new()),
                tickets: Arc::new(MemoryTicketService::new()),
            }
        }
    };

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics at http://{}/metrics", metrics_bind);
    }

    let state = api::AppState::new(
        backend.store,
        backend.accounts,
        backend.tickets,
        &config.casino,
        &config.sportsbook,
    )?;
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
