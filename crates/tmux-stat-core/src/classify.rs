//! Event classifier: Codex telemetry event → pane status decision.
//!
//! Precedence is fixed and first match wins. Events that produce no
//! decision must leave the pane's persisted status untouched.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeMap;

pub const CONVERSATION_STARTS: &str = "codex.conversation_starts";
pub const TOOL_DECISION: &str = "codex.tool_decision";
pub const TOOL_RESULT: &str = "codex.tool_result";
pub const CONVERSATION_ENDS: &str = "codex.conversation_ends";
pub const RESPONSE: &str = "codex.response";
pub const USER_INPUT_REQUIRED: &str = "codex.user_input_required";

/// Display-facing status of a pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaneStatus {
    Running,
    Attention,
    Done,
}

impl PaneStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Attention => "attention",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PaneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one event.
///
/// `status == None` means "no decision"; `message` is then empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDecision {
    pub status: Option<PaneStatus>,
    pub message: String,
}

impl StatusDecision {
    pub fn none() -> Self {
        Self {
            status: None,
            message: String::new(),
        }
    }

    fn of(status: PaneStatus, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// `(status, message)` when a decision was made.
    pub fn into_parts(self) -> Option<(PaneStatus, String)> {
        let message = self.message;
        self.status.map(|status| (status, message))
    }
}

/// Classify an event. Pure; never fails.
pub fn classify(event_name: &str, attributes: &AttributeMap) -> StatusDecision {
    let tool = display_attr(attributes, &["tool_name", "tool"]);
    let status = attributes.get_str("status").unwrap_or("");

    match event_name {
        CONVERSATION_STARTS => match display_attr(attributes, &["model"]) {
            Some(model) => StatusDecision::of(PaneStatus::Running, format!("Codex: {model}")),
            None => StatusDecision::of(PaneStatus::Running, "Codex started"),
        },
        TOOL_DECISION => {
            if status == "pending" || attributes.is_truthy("needs_approval") {
                labelled(PaneStatus::Attention, "Approve? ", tool, "Approval needed")
            } else if status == "approved" {
                labelled(PaneStatus::Running, "Approved: ", tool, "Tool approved")
            } else if status == "denied" {
                labelled(PaneStatus::Done, "Denied: ", tool, "Tool denied")
            } else {
                StatusDecision::none()
            }
        }
        TOOL_RESULT => {
            // `success` defaults to true when absent.
            let succeeded = attributes
                .get("success")
                .is_none_or(|v| v.is_truthy());
            if !succeeded || status == "failed" || attributes.is_truthy("error") {
                labelled(PaneStatus::Attention, "Failed: ", tool, "Tool failed")
            } else {
                labelled(PaneStatus::Running, "Ran: ", tool, "Tool completed")
            }
        }
        CONVERSATION_ENDS => StatusDecision::of(PaneStatus::Done, "Codex finished"),
        RESPONSE => StatusDecision::of(PaneStatus::Running, "Generating..."),
        USER_INPUT_REQUIRED => StatusDecision::of(PaneStatus::Attention, "Input needed"),
        _ => StatusDecision::none(),
    }
}

/// First present key wins, even if its rendering is empty; empty renders
/// count as absent for message formatting.
fn display_attr(attributes: &AttributeMap, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| attributes.get(key))
        .map(ToString::to_string)
        .filter(|s| !s.is_empty())
}

fn labelled(
    status: PaneStatus,
    prefix: &str,
    tool: Option<String>,
    fallback: &str,
) -> StatusDecision {
    match tool {
        Some(tool) => StatusDecision::of(status, format!("{prefix}{tool}")),
        None => StatusDecision::of(status, fallback),
    }
}
