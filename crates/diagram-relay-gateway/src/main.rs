//! Diagram relay sidecar.
//!
//! Sits between the browser-hosted diagram view (WebSocket) and the editor
//! (line-delimited JSON over TCP) and forwards action envelopes both ways.
//!
//! Usage: `diagram-relay-gateway [config.yaml]`. Without a path the built-in
//! defaults are used. Logs go to stderr (`RUST_LOG`); stdout carries a single
//! ready line once both listeners are bound.

use std::process::ExitCode;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use diagram_relay_core::error::Result;
use diagram_relay_gateway::{app_state::AppState, config, router, transport};

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "diagram relay failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cfg = match std::env::args().nth(1) {
        Some(path) => config::load_from_file(&path)?,
        None => config::RelayConfig::default(),
    };
    let browser_addr = cfg.browser.listen_addr()?;
    let editor_addr = cfg.editor.listen_addr()?;
    let ws_path = cfg.browser.ws_path.clone();

    let state = AppState::new(cfg)?;

    let http = TcpListener::bind(browser_addr).await?;
    let tcp = TcpListener::bind(editor_addr).await?;
    let http_addr = http.local_addr()?;
    let tcp_addr = tcp.local_addr()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let editor_task = tokio::spawn(transport::editor::serve(state.clone(), tcp, shutdown_rx.clone()));

    tracing::info!(browser = %http_addr, editor = %tcp_addr, "diagram relay starting");
    println!("diagram relay ready: browser=ws://{http_addr}{ws_path} editor=tcp://{tcp_addr}");

    {
        let state = state.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("shutdown requested; draining");
                    state.set_draining();
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "ctrl-c handler unavailable; running until killed");
                    std::future::pending::<()>().await;
                }
            }
        });
    }

    let app = router::build_router(state);
    axum::serve(http, app)
        .with_graceful_shutdown(transport::shutdown_requested(shutdown_rx))
        .await?;

    let _ = editor_task.await;
    tracing::info!("diagram relay stopped");
    Ok(())
}
