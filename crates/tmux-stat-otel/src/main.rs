//! tmux-stat-otel: OTLP receiver for Codex CLI telemetry.
//! Maps Codex events to per-pane tmux status files.

use clap::Parser;

mod cli;
mod daemon;
mod monitor;
mod otlp;
mod receiver;
mod server;
mod sink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = cli::Cli::parse();

    // stdout belongs to whoever launched us; logs go to stderr
    let filter = std::env::var("TMUX_STAT_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    daemon::run_daemon(opts).await
}
