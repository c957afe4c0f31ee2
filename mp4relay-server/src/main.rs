use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mp4relay_engine::{CacheStore, FetcherConfig, OriginFetcher};
use mp4relay_server::cli::CliArgs;
use mp4relay_server::config::ServerConfig;
use mp4relay_server::error::AppError;
use mp4relay_server::routes;
use mp4relay_server::state::AppState;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Server failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // A .env file next to the binary is honored, real env wins
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();

    // Setup logging
    let default_directive = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .init();

    let config = ServerConfig::resolve(&args)?;
    info!(
        cache_dir = %config.cache_dir.display(),
        max_cache_size = config.max_cache_size,
        route = %config.route_path(),
        "Starting mp4relay"
    );

    let store = CacheStore::open(&config.cache_dir).await?;
    let fetcher = OriginFetcher::new(&FetcherConfig::default())?;

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(store, fetcher, config);
    let router = routes::build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(error = %error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(error = %error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down");
}
