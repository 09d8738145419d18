//! LocalGhost daemon entry point.
//!
//! Assembles settings (environment, then CLI overrides), builds the
//! kernel, registers the built-in demo plugin, serves the HTTP/WebSocket
//! adapter, and shuts down cleanly on Ctrl-C.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use localghost_daemon::cli::Cli;
use localghost_daemon::demo_plugin::DemoPlugin;
use localghost_kernel::Kernel;
use localghost_telemetry::{setup_logging, LogConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::new(cli.log_level.clone()).with_format(cli.log_format.into());
    setup_logging(&log_config).context("failed to initialize logging")?;

    let settings = cli.resolve_settings().context("failed to resolve settings")?;
    let host = settings.host.clone();
    let port = settings.port;
    let port_file = settings.port_file_path();

    let kernel = if cli.no_consent_prompt {
        Kernel::bootstrap_headless(settings)
    } else {
        Kernel::bootstrap_native(settings)
    }
    .context("failed to bootstrap kernel")?;

    kernel.registry().register(Arc::new(DemoPlugin)).await;

    let kernel = Arc::new(kernel);
    let app = localghost_daemon::build_router(kernel.clone());

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind to {host}:{port}"))?;
    let bound_addr = listener.local_addr().context("failed to read bound address")?;

    if let Some(parent) = port_file.parent() {
        std::fs::create_dir_all(parent).context("failed to create data directory")?;
    }
    std::fs::write(&port_file, bound_addr.port().to_string()).context("failed to write port file")?;

    tracing::info!(addr = %bound_addr, "localghost daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("localghost daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to install Ctrl-C handler; shutdown signal will never fire");
        std::future::pending::<()>().await;
    }
}
