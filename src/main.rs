use anyhow::Result;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::sync::oneshot;
use tracing::{error, info};

use autozip::backup::{BackupError, BackupManager};
use autozip::utils::{self, browser};

#[tokio::main]
async fn main() -> Result<()> {
    utils::logging::init_tracing();

    // Load configuration
    let config = utils::config::load_config()?;

    info!("Starting AutoZIP v{}", env!("CARGO_PKG_VERSION"));

    // Probe for a free local port
    let Some(port) = utils::port::find_available_port(config.port, config.port_attempts) else {
        let err = BackupError::PortsExhausted {
            start: config.port,
            end: u32::from(config.port) + u32::from(config.port_attempts),
        };
        error!("{}", err);
        return Err(err.into());
    };

    let open_browser = config.open_browser;
    let browser_delay = config.browser_delay;
    let manager = BackupManager::new(config)?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    manager.set_shutdown_handle(shutdown_tx);

    let app = autozip::web::app(manager);

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let url = format!("http://localhost:{}", port);
    info!("AutoZIP listening on {}", url);

    if open_browser {
        browser::open_after(url, browser_delay);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_rx))
        .await?;

    info!("Server stopped gracefully");
    Ok(())
}

async fn shutdown_signal(requested: oneshot::Receiver<()>) {
    use tokio::signal;

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

    // A dropped sender must not stop the server
    let requested = async {
        if requested.await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received"),
        _ = terminate => info!("Terminate signal received"),
        _ = requested => info!("Shutdown requested from the UI"),
    }
}
