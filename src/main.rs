//! mpvctl
//!
//! Starts an mpv process, optionally queues a playlist file and keeps the
//! progress line running until interrupted or the player goes away.
//!
//! Usage: `mpvctl [PLAYLIST.m3u]`

use mpvctl::player::{NoMediaSource, Player};
use mpvctl::session::Session;
use mpvctl::surface::TerminalSurface;
use mpvctl::config;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never tear the progress line on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mpvctl=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!(
        "Starting mpvctl v{} ({})",
        env!("MPVCTL_VERSION"),
        env!("MPVCTL_GIT_SHA")
    );

    let config = config::load_config()?;
    let options = config.session_options();
    tracing::info!(
        "Configuration loaded, socket: {}",
        options.socket_path.display()
    );

    // A player left behind by an earlier run would hold the socket
    Session::send_quit(&options.socket_path).await;

    let (session, events) = Session::init(options).await?;
    tracing::info!("Player connected");

    let player = Player::start(
        session.clone(),
        events,
        Arc::new(NoMediaSource),
        Arc::new(TerminalSurface::from_env()),
        config.player_settings(),
    );

    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        match player.open_playlist(&path).await {
            Ok(added) => tracing::info!("Queued {} entries from {}", added, path.display()),
            Err(e) => tracing::warn!("Could not open {}: {}", path.display(), e),
        }
    }

    tokio::select! {
        _ = shutdown_signal() => tracing::info!("Shutdown requested"),
        _ = session.wait_closed() => tracing::warn!("Player connection closed"),
    }

    player.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
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
}
