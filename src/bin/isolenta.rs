//! Isolenta OAuth 2 authorization server binary.
//!
//! Loads the client list from a TOML file, serves the OAuth endpoints and sweeps
//! expired tokens in the background until interrupted.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use isolenta::{
    config::{Config, DEFAULT_CONFIG_FILE, example_config_toml},
    http::{AppState, build_router, serve},
    oauth::{AuthorizationServer, MemoryOAuthStorage, OAuthStorage, TokenIntrospector, TokenStore},
};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_subscriber::prelude::*;

/// Minimal OAuth 2 authorization server for development and testing
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Print an example configuration and exit
    #[arg(long)]
    example_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "isolenta=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.example_config {
        print!("{}", example_config_toml()?);
        return Ok(());
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Isolenta");

    let config = Config::load(&args.config)?;

    let storage: Arc<dyn OAuthStorage> = Arc::new(MemoryOAuthStorage::new());
    let auth_server = Arc::new(AuthorizationServer::new(
        storage.clone(),
        config.token_lifetimes,
    ));

    for user in &config.users {
        let (client, password) = user.registration();
        tracing::info!(
            client_id = %client.id,
            domain = %client.domain,
            password_grant = password.is_some(),
            "Registering client"
        );
        auth_server.registry().register(client, password).await?;
    }

    let app = build_router(AppState {
        auth_server,
        introspector: TokenIntrospector::new(storage.clone()),
    });

    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    {
        let tracker = tracker.clone();
        let inner_token = token.clone();

        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::spawn(async move {
            tokio::select! {
                () = inner_token.cancelled() => { },
                _ = terminate => {},
                _ = ctrl_c => {},
            }

            tracker.close();
            inner_token.cancel();
        });
    }

    // Expired token sweep
    {
        let storage = storage.clone();
        let inner_token = token.clone();
        let period = *config.cleanup_interval.as_ref();
        tracker.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = inner_token.cancelled() => break,
                    _ = interval.tick() => {
                        match storage.cleanup_expired_tokens().await {
                            Ok(0) => {}
                            Ok(removed) => tracing::debug!(removed, "Removed expired tokens"),
                            Err(err) => tracing::error!(error = ?err, "Token cleanup failed"),
                        }
                    }
                }
            }
        });
    }

    // Start HTTP server
    {
        let listener = TcpListener::bind(config.serve_at.as_ref()).await?;
        tracing::info!("Serving at {}", config.serve_at.as_ref());

        let header_read_timeout = *config.header_read_timeout.as_ref();
        let inner_token = token.clone();
        let connections = tracker.clone();
        tracker.spawn(async move {
            serve(listener, app, header_read_timeout, inner_token, connections).await;
        });
    }

    tracker.wait().await;

    tracing::info!("Isolenta stopped");
    Ok(())
}
