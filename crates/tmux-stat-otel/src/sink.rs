//! State sink: per-pane status files read by the tmux status line.
//!
//! File layout: `<state_dir>/<pane id without leading %>.state`, one JSON
//! object per file. Writes go through a sibling temp file and a rename so
//! the status line never reads a partial record.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tmux_stat_core::PaneStatus;
use tmux_stat_tmux::{TmuxCommandRunner, refresh_client, window_id};

const STATE_FILE_EXT: &str = "state";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("pane id {0:?} cannot name a state file")]
    InvalidPaneId(String),

    #[error("state file io error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode status record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Persisted record consumed by the status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: PaneStatus,
    /// Unix seconds.
    pub timestamp: i64,
    pub session_id: String,
    /// `""` when the window lookup fails.
    pub tmux_window: String,
    pub message: String,
}

/// A status change resolved to a pane, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub pane_id: String,
    pub status: PaneStatus,
    pub session_id: String,
    pub message: String,
}

pub struct StateSink<R> {
    state_dir: PathBuf,
    runner: R,
    /// Only refresh the status line when running inside tmux.
    refresh_display: bool,
    tmp_seq: AtomicU64,
}

impl<R: TmuxCommandRunner> StateSink<R> {
    pub fn new(state_dir: impl Into<PathBuf>, runner: R, refresh_display: bool) -> Self {
        Self {
            state_dir: state_dir.into(),
            runner,
            refresh_display,
            tmp_seq: AtomicU64::new(0),
        }
    }

    pub async fn ensure_dir(&self) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.state_dir).await?;
        Ok(())
    }

    /// State file for `pane_id`; leading `%` characters are stripped.
    pub fn state_path(&self, pane_id: &str) -> Result<PathBuf, SinkError> {
        let safe_id = pane_id.trim_start_matches('%');
        if safe_id.is_empty()
            || safe_id == "."
            || safe_id == ".."
            || safe_id.contains(['/', '\\', '\0'])
        {
            return Err(SinkError::InvalidPaneId(pane_id.to_string()));
        }
        Ok(self.state_dir.join(format!("{safe_id}.{STATE_FILE_EXT}")))
    }

    /// Persist `update`, then refresh the display. The window lookup and the
    /// refresh are best-effort and never fail the write.
    pub async fn write_status(
        &self,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<StatusRecord, SinkError> {
        let path = self.state_path(&update.pane_id)?;

        let tmux_window = match window_id(&self.runner, &update.pane_id).await {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(pane_id = %update.pane_id, error = %e, "window lookup failed");
                String::new()
            }
        };

        let record = StatusRecord {
            status: update.status,
            timestamp: now.timestamp(),
            session_id: update.session_id.clone(),
            tmux_window,
            message: update.message.clone(),
        };
        let bytes = serde_json::to_vec(&record)?;

        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{STATE_FILE_EXT}.{}.{seq}.tmp", std::process::id()));
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        self.refresh().await;
        Ok(record)
    }

    /// Delete the pane's state file, then refresh the display. A missing file
    /// is not an error. Returns whether a file was removed.
    pub async fn remove(&self, pane_id: &str) -> Result<bool, SinkError> {
        let path = self.state_path(pane_id)?;
        let removed = match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        self.refresh().await;
        Ok(removed)
    }

    /// Read back a pane's record, if any.
    #[cfg(test)]
    pub async fn read_status(&self, pane_id: &str) -> Result<Option<StatusRecord>, SinkError> {
        let path = self.state_path(pane_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn refresh(&self) {
        if !self.refresh_display {
            return;
        }
        if let Err(e) = refresh_client(&self.runner).await {
            tracing::debug!(error = %e, "tmux refresh failed");
        }
    }
}
