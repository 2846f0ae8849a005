//! Daemon wiring: registry + state sink + HTTP server + lifecycle monitor.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use tmux_stat_core::{Lifecycle, PaneRegistry};
use tmux_stat_tmux::TmuxExecutor;

use crate::cli::Cli;
use crate::monitor::run_monitor;
use crate::receiver::ReceiverState;
use crate::server;
use crate::sink::StateSink;

/// Run until a signal arrives or the idle timeout fires.
pub async fn run_daemon(opts: Cli) -> anyhow::Result<()> {
    let state_dir = opts.state_dir();
    // Window lookup is always attempted; the refresh only makes sense inside tmux.
    let refresh_display = std::env::var_os("TMUX").is_some();
    let sink = StateSink::new(&state_dir, build_executor(&opts), refresh_display);
    sink.ensure_dir()
        .await
        .with_context(|| format!("failed to create state directory {}", state_dir.display()))?;

    let registry = Arc::new(PaneRegistry::new(Utc::now()));
    let state = Arc::new(ReceiverState::new(Arc::clone(&registry), sink));

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, opts.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, state_dir = %state_dir.display(), "OTEL receiver listening");

    let shutdown = CancellationToken::new();

    let monitor_handle = tokio::spawn(run_monitor(
        registry,
        Lifecycle::new(opts.lifecycle_config()),
        shutdown.clone(),
        Utc::now,
    ));
    let signal_handle = tokio::spawn(wait_for_signal(shutdown.clone()));

    let result = server::serve(listener, state, shutdown.clone()).await;
    shutdown.cancel();
    if let Err(e) = monitor_handle.await {
        tracing::warn!(error = %e, "monitor task failed");
    }
    signal_handle.abort();

    result?;
    tracing::info!("OTEL receiver stopped");
    Ok(())
}

fn build_executor(opts: &Cli) -> TmuxExecutor {
    let executor = TmuxExecutor::default();
    match opts.tmux_socket {
        Some(ref socket) => executor.with_socket_path(socket.clone()),
        None => executor,
    }
}

/// Cancel `shutdown` on ctrl-c or SIGTERM.
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                    () = shutdown.cancelled() => return,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                    () = shutdown.cancelled() => return,
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
            () = shutdown.cancelled() => return,
        }
    }

    shutdown.cancel();
}
