mod routes;
mod state;
mod store;

use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "duosync-server")]
#[command(about = "DuoSync - shared availability timeline server")]
#[command(version)]
struct Args {
    /// Port to listen on.
    #[arg(short, long, env = "DUOSYNC_PORT", default_value = "4280")]
    port: u16,

    /// Path to the SQLite database file.
    #[arg(long, env = "DUOSYNC_DB", default_value = "duosync.db")]
    db: PathBuf,

    /// Default log filter (RUST_LOG takes precedence when set).
    #[arg(long, default_value = "duosync_server=info")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log)),
        )
        .init();

    let state = AppState::new(&args.db)?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::timeline::router())
        .merge(routes::intervals::router())
        .with_state(state)
        .layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    tracing::info!("duosync-server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
