//! tmux-stat-tmux: tmux IO boundary.
//! Bounded subprocess execution plus the two commands the status display
//! needs: window-id lookup and status-line refresh. No business logic.

pub mod display;
pub mod error;
pub mod executor;

pub use display::{refresh_client, window_id};
pub use error::TmuxError;
pub use executor::{DEFAULT_COMMAND_TIMEOUT, TmuxCommandRunner, TmuxExecutor};
