//! Backend process entry point: load the collection, negotiate ports, and
//! run both servers until a client asks us to quit.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};

use exo_backend::backend::{self, BackState, LoggingLauncher};
use exo_backend::config::AppConfig;
use exo_backend::fileserver;
use exo_backend::game::{GameCollection, PlaylistRegistry};
use exo_backend::net;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path)?;
    info!("Using config {}", config_path.display());

    // The UI process must present this secret as its first message.
    let secret = match std::env::var("EXO_BACKEND_SECRET") {
        Ok(secret) if !secret.is_empty() => secret,
        _ => {
            let generated = uuid::Uuid::new_v4().to_string();
            info!("Generated session secret: {generated}");
            generated
        }
    };

    let collection = Arc::new(GameCollection::load_or_empty(&config.catalog_file()));
    let playlists = Arc::new(PlaylistRegistry::new());
    playlists.load_dir(&config.playlist_dir());
    playlists.rebuild_installed(&collection);

    let host: IpAddr = if config.accept_remote {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    };
    let back_ports = (config.back_port_min, config.back_port_max);
    let file_ports = (config.file_port_min, config.file_port_max);

    let state = BackState::new(
        config,
        config_path,
        secret,
        collection,
        playlists,
        Box::new(LoggingLauncher),
    );

    // The file server degrades gracefully: without it, media is simply
    // unavailable.
    match net::bind_first_free(host, file_ports.0, file_ports.1).await {
        Ok(listener) => {
            let port = listener.local_addr()?.port();
            state.set_file_server_port(port);
            info!("File server listening on port {port}");
            let file_state = Arc::clone(&state);
            tokio::spawn(async move {
                if let Err(error) = fileserver::run_file_server(file_state, listener).await {
                    warn!("File server stopped: {error:#}");
                }
            });
        }
        Err(error) => warn!("File server unavailable: {error}"),
    }

    // The message server is the process' reason to exist; failing to open
    // it is fatal.
    let listener = net::bind_first_free(host, back_ports.0, back_ports.1)
        .await
        .context("failed to open the message server")?;
    info!(
        "Message server listening on port {}",
        listener.local_addr()?.port()
    );

    let mut shutdown = state.subscribe_shutdown();
    tokio::select! {
        result = backend::run_message_server(Arc::clone(&state), listener) => result?,
        _ = shutdown.changed() => info!("Shutdown requested, exiting"),
    }
    Ok(())
}
