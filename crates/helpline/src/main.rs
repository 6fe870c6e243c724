//! # helpline
//!
//! Support-chat server binary — wires together all crates and starts the
//! HTTP/WebSocket server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use helpline_rpc::{MethodRegistry, RpcContext};
use helpline_runtime::{Coordinator, Notifier, SessionRegistry};
use helpline_server::config::ServerConfig;
use helpline_server::server::HelplineServer;
use helpline_store::{new_file, run_migrations, ChatStore, ConnectionConfig};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

/// Helpline support-chat server.
#[derive(Parser, Debug)]
#[command(name = "helpline", about = "Support-chat server")]
struct Cli {
    /// Host to bind (overrides config file).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config file; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Path to a JSON config file, merged over built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn default_db_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".helpline").join("helpline.db")
    }
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Config: defaults <- file <- HELPLINE_* env <- CLI flags.
    let mut config = ServerConfig::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    // Database.
    let db_path = args.db_path.unwrap_or_else(Cli::default_db_path);
    ensure_parent_dir(&db_path)?;
    let db_str = db_path.to_string_lossy();
    let pool =
        new_file(&db_str, &ConnectionConfig::default()).context("Failed to open database")?;
    {
        let conn = pool.get().context("Failed to get DB connection")?;
        let _ = run_migrations(&conn).context("Failed to run migrations")?;
    }
    tracing::info!(db_path = %db_path.display(), "database ready");

    // Core services.
    let store = Arc::new(ChatStore::new(pool));
    let sessions = Arc::new(SessionRegistry::new());
    let notifier = Notifier::default();
    let coordinator = Arc::new(Coordinator::new(
        store,
        Arc::clone(&sessions),
        notifier.clone(),
    ));

    let rpc_context = RpcContext { coordinator };

    let mut registry = MethodRegistry::new();
    helpline_rpc::handlers::register_all(&mut registry);
    let method_count = registry.methods().len();

    let metrics = helpline_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let server = HelplineServer::new(config, registry, rpc_context, sessions, metrics);

    // Notification consumer: logs appended messages. A push-delivery
    // bridge would subscribe the same way.
    let mut notifications = notifier.subscribe();
    let notify_token = server.shutdown().token();
    let notify_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = notify_token.cancelled() => break,
                received = notifications.recv() => match received {
                    Ok(n) => {
                        tracing::debug!(
                            session_id = %n.session_id,
                            sender_kind = %n.sender_kind,
                            "message notification"
                        );
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "notification consumer lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;

    tracing::info!("helpline listening on http://{addr} ({method_count} RPC methods registered)");

    // Wait for shutdown signal.
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(vec![handle, notify_task], None)
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}
