use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use sea_orm::Database;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use hotspot_cloud::db::schema::ensure_schema;
use hotspot_cloud::server::config::ServerConfig;
use hotspot_cloud::version::VERSION;
use hotspot_cloud::web::{AppState, create_axum_router};

#[derive(Parser, Debug)]
#[command(version = VERSION, about = "Hotspot billing cloud for captive-portal routers")]
struct Args {
    /// Path to a TOML config file. Environment variables override its values.
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Default to `info` if RUST_LOG is not set, with SQL statement noise muted.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for the shutdown signal.");
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir);
    info!(version = VERSION, "Starting hotspot cloud server...");

    if config.bind_secret_missing() {
        warn!("BIND_MASTER_SECRET is not set. Bind codes are derived from an empty key and are guessable.");
    }

    let db = Database::connect(&config.database_url).await.map_err(|e| {
        error!(error = %e, "Failed to connect to the database.");
        e
    })?;
    ensure_schema(&db).await?;
    info!("Database schema is ready.");

    let listen_addr = config.listen_addr.clone();
    let app_state = Arc::new(AppState::new(db, Arc::new(config)));
    let app = create_axum_router(app_state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!(address = %listen_addr, "HTTP server listening.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped.");
    Ok(())
}
