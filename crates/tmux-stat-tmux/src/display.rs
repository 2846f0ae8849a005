//! Status-display commands.

use crate::error::TmuxError;
use crate::executor::TmuxCommandRunner;

/// Window id (e.g. `@4`) containing `pane_id`.
pub async fn window_id<R: TmuxCommandRunner>(runner: &R, pane_id: &str) -> Result<String, TmuxError> {
    let stdout = runner
        .run(&["display-message", "-t", pane_id, "-p", "#{window_id}"])
        .await?;
    Ok(stdout.trim().to_string())
}

/// Redraw the status line of the attached client.
pub async fn refresh_client<R: TmuxCommandRunner>(runner: &R) -> Result<(), TmuxError> {
    runner.run(&["refresh-client", "-S"]).await?;
    Ok(())
}
