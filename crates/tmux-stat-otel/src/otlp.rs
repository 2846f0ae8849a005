//! OTLP/JSON export envelopes (logs and traces).
//!
//! Only the fields needed to reach each record's `name` and `attributes`
//! are modelled; everything else in the envelope is ignored.

use serde::Deserialize;
use serde_json::error::Category;
use tmux_stat_core::RawAttribute;

/// Body of `POST /v1/logs` or `POST /v1/traces`. Both halves may be present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    #[serde(default)]
    pub resource_logs: Vec<ResourceLogs>,
    #[serde(default)]
    pub resource_spans: Vec<ResourceSpans>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLogs {
    #[serde(default)]
    pub scope_logs: Vec<ScopeLogs>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeLogs {
    #[serde(default)]
    pub log_records: Vec<Record>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpans {
    #[serde(default)]
    pub scope_spans: Vec<ScopeSpans>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSpans {
    #[serde(default)]
    pub spans: Vec<Record>,
}

/// A log record or a span; both are processed identically.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub attributes: Vec<RawAttribute>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Not JSON at all: a client error.
    #[error("invalid JSON: {0}")]
    Syntax(serde_json::Error),
    /// Valid JSON that does not fit the envelope.
    #[error("unexpected payload shape: {0}")]
    Shape(serde_json::Error),
}

impl ExportPayload {
    /// Decode a request body. An empty body is an empty payload.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        if body.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| match e.classify() {
            Category::Data => DecodeError::Shape(e),
            Category::Syntax | Category::Eof | Category::Io => DecodeError::Syntax(e),
        })
    }

    /// Every record, log records first, then spans.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        let logs = self
            .resource_logs
            .iter()
            .flat_map(|r| &r.scope_logs)
            .flat_map(|s| &s.log_records);
        let spans = self
            .resource_spans
            .iter()
            .flat_map(|r| &r.scope_spans)
            .flat_map(|s| &s.spans);
        logs.chain(spans)
    }
}
