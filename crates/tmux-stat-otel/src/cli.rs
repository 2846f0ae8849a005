//! CLI definition using clap derive.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tmux_stat_core::LifecycleConfig;

pub const DEFAULT_PORT: u16 = 4319;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "tmux-stat-otel",
    about = "OTLP receiver mapping Codex CLI telemetry to tmux pane status"
)]
pub struct Cli {
    /// Port to listen on (loopback only)
    #[arg(long, short = 'p', env = "OTEL_RECEIVER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// State directory (default: $HOME/.claude/tmux-stat)
    #[arg(long, short = 'd', env = "STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Shut down after this many seconds without activity
    #[arg(
        long,
        env = "OTEL_RECEIVER_IDLE_TIMEOUT",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub idle_timeout: u64,

    /// Evict pane mappings older than this many seconds
    #[arg(
        long,
        env = "OTEL_RECEIVER_STALE_TIMEOUT",
        default_value_t = 600,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub stale_timeout: u64,

    /// Seconds between housekeeping sweeps
    #[arg(
        long,
        env = "OTEL_RECEIVER_SWEEP_INTERVAL",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sweep_interval: u64,

    /// tmux socket path
    #[arg(long, env = "TMUX_STAT_TMUX_SOCKET")]
    pub tmux_socket: Option<String>,
}

impl Cli {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            sweep_interval: Duration::from_secs(self.sweep_interval),
            idle_timeout: Duration::from_secs(self.idle_timeout),
            stale_timeout: Duration::from_secs(self.stale_timeout),
        }
    }
}

/// Per-user state directory read by the tmux status line.
pub fn default_state_dir() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
    home.join(".claude").join("tmux-stat")
}
