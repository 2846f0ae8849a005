//! Receiver pipeline: OTLP record → attributes → status decision → pane → state file.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tmux_stat_core::{BindingKey, PaneRegistry, RegistryError, classify, extract_attributes};
use tmux_stat_tmux::TmuxCommandRunner;

use crate::otlp::{ExportPayload, Record};
use crate::sink::{StateSink, StatusUpdate};

/// Shared receiver state, one per process.
pub struct ReceiverState<R> {
    pub registry: Arc<PaneRegistry>,
    pub sink: StateSink<R>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub records: usize,
    /// Records that produced a status write.
    pub applied: usize,
}

impl<R: TmuxCommandRunner> ReceiverState<R> {
    pub fn new(registry: Arc<PaneRegistry>, sink: StateSink<R>) -> Self {
        Self { registry, sink }
    }

    pub fn register(
        &self,
        pane_id: &str,
        conversation_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<BindingKey, RegistryError> {
        let key = self.registry.register(pane_id, conversation_id, now)?;
        tracing::info!(pane_id = %pane_id, mapping_key = %key, "pane registered");
        Ok(key)
    }

    /// Drop every binding for the pane and clear its state file.
    pub async fn unregister(&self, pane_id: &str, now: DateTime<Utc>) -> Result<(), RegistryError> {
        let removed = self.registry.unregister(pane_id, now)?;
        tracing::info!(pane_id = %pane_id, removed, "pane unregistered");

        if let Err(e) = self.sink.remove(pane_id).await {
            tracing::warn!(pane_id = %pane_id, error = %e, "failed to remove state file");
        }
        Ok(())
    }

    /// Process every record of a decoded payload. Sink failures are logged
    /// per record and never abort the rest of the payload.
    pub async fn ingest(&self, payload: &ExportPayload, now: DateTime<Utc>) -> IngestSummary {
        self.registry.touch(now);

        let mut summary = IngestSummary::default();
        for record in payload.records() {
            summary.records += 1;
            let Some(update) = self.route(record) else {
                continue;
            };
            match self.sink.write_status(&update, now).await {
                Ok(_) => {
                    summary.applied += 1;
                    tracing::debug!(
                        pane_id = %update.pane_id,
                        status = %update.status,
                        message = %update.message,
                        "pane status updated"
                    );
                }
                Err(e) => {
                    tracing::warn!(pane_id = %update.pane_id, error = %e, "failed to write state");
                }
            }
        }
        summary
    }

    /// Classify a record and resolve its pane. `None` means nothing to write:
    /// no event name, no decision, or no pane.
    fn route(&self, record: &Record) -> Option<StatusUpdate> {
        let attributes = extract_attributes(&record.attributes);
        let event_name = attributes.event_name(record.name.as_deref())?;
        let (status, message) = classify(event_name, &attributes).into_parts()?;

        let conversation_id = attributes.conversation_id().unwrap_or_default();
        let Some(pane_id) = self.registry.resolve(conversation_id) else {
            tracing::debug!(event = %event_name, conversation_id = %conversation_id, "no pane for event");
            return None;
        };

        Some(StatusUpdate {
            pane_id,
            status,
            session_id: conversation_id.to_string(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::tests::MockTmux;
    use tmux_stat_core::PaneStatus;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_000_000, 0).expect("valid timestamp")
    }

    fn make_state(dir: &std::path::Path) -> ReceiverState<MockTmux> {
        ReceiverState::new(
            Arc::new(PaneRegistry::new(now())),
            StateSink::new(dir, MockTmux::with_window("@1"), false),
        )
    }

    fn log_payload(attrs: serde_json::Value) -> ExportPayload {
        serde_json::from_value(serde_json::json!({
            "resourceLogs": [{"scopeLogs": [{"logRecords": [{"attributes": attrs}]}]}]
        }))
        .expect("payload")
    }

    fn string_attr(key: &str, value: &str) -> serde_json::Value {
        serde_json::json!({"key": key, "value": {"stringValue": value}})
    }

    #[tokio::test]
    async fn pending_pane_adopted_on_conversation_start() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = make_state(dir.path());

        let key = state.register("%3", None, now()).expect("register");
        assert_eq!(key.to_string(), "pending_%3");

        let payload = log_payload(serde_json::json!([
            string_attr("event.name", "codex.conversation_starts"),
            string_attr("model", "gpt-5"),
            string_attr("conversation_id", "abc"),
        ]));
        let summary = state.ingest(&payload, now()).await;
        assert_eq!(summary, IngestSummary { records: 1, applied: 1 });

        let bindings = state.registry.snapshot();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].key(), BindingKey::Conversation("abc".to_string()));
        assert_eq!(bindings[0].pane_id, "%3");

        let record = state.sink.read_status("%3").await.expect("read").expect("record");
        assert_eq!(record.status, PaneStatus::Running);
        assert_eq!(record.message, "Codex: gpt-5");
        assert_eq!(record.session_id, "abc");
        assert_eq!(record.tmux_window, "@1");
    }

    #[tokio::test]
    async fn unknown_event_changes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = make_state(dir.path());
        state.register("%3", None, now()).expect("register");

        let payload = log_payload(serde_json::json!([
            string_attr("event.name", "codex.api_request"),
            string_attr("conversation_id", "abc"),
        ]));
        let summary = state.ingest(&payload, now()).await;
        assert_eq!(summary.applied, 0);
        assert!(state.registry.snapshot()[0].is_pending(), "no adoption");
        assert_eq!(state.sink.read_status("%3").await.expect("read"), None);
    }

    #[tokio::test]
    async fn unresolvable_pane_is_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = make_state(dir.path());
        let payload = log_payload(serde_json::json!([
            string_attr("event.name", "codex.response"),
            string_attr("conversation_id", "abc"),
        ]));
        let summary = state.ingest(&payload, now()).await;
        assert_eq!(summary, IngestSummary { records: 1, applied: 0 });
        assert_eq!(std::fs::read_dir(dir.path()).expect("read_dir").count(), 0);
    }

    #[tokio::test]
    async fn record_without_event_name_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = make_state(dir.path());
        state.register("%1", Some("abc"), now()).expect("register");
        let payload = log_payload(serde_json::json!([string_attr("conversation_id", "abc")]));
        assert_eq!(state.ingest(&payload, now()).await.applied, 0);
    }

    #[tokio::test]
    async fn span_name_used_as_event_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = make_state(dir.path());
        state.register("%5", Some("sess-1"), now()).expect("register");

        let payload: ExportPayload = serde_json::from_value(serde_json::json!({
            "resourceSpans": [{"scopeSpans": [{"spans": [{
                "name": "codex.user_input_required",
                "attributes": [string_attr("session_id", "sess-1")],
            }]}]}]
        }))
        .expect("payload");
        assert_eq!(state.ingest(&payload, now()).await.applied, 1);

        let record = state.sink.read_status("%5").await.expect("read").expect("record");
        assert_eq!(record.status, PaneStatus::Attention);
        assert_eq!(record.message, "Input needed");
        assert_eq!(record.session_id, "sess-1");
    }

    #[tokio::test]
    async fn mistyped_attribute_does_not_drop_sibling_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = make_state(dir.path());
        state.register("%2", Some("abc"), now()).expect("register");

        let body = br#"{"resourceLogs": [{"scopeLogs": [{"logRecords": [
            {"attributes": [
                {"key": "event.name", "value": {"stringValue": "codex.conversation_ends"}},
                {"key": "conversation_id", "value": {"stringValue": "abc"}}
            ]},
            {"attributes": [
                {"key": "event.name", "value": {"stringValue": "codex.response"}},
                {"key": "flag", "value": {"boolValue": "true"}}
            ]}
        ]}]}]}"#;
        let payload = ExportPayload::decode(body).expect("decode");
        let summary = state.ingest(&payload, now()).await;
        assert_eq!(summary.records, 2);

        let record = state.sink.read_status("%2").await.expect("read").expect("record");
        assert_eq!(record.status, PaneStatus::Done);
        assert_eq!(record.message, "Codex finished");
    }

    #[tokio::test]
    async fn reingest_overwrites_with_same_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = make_state(dir.path());
        state.register("%2", Some("abc"), now()).expect("register");
        let payload = log_payload(serde_json::json!([
            string_attr("event.name", "codex.conversation_ends"),
            string_attr("conversation_id", "abc"),
        ]));

        state.ingest(&payload, now()).await;
        let first = state.sink.read_status("%2").await.expect("read");
        state.ingest(&payload, now()).await;
        let second = state.sink.read_status("%2").await.expect("read");

        assert_eq!(first, second);
        assert_eq!(state.registry.count(), 1);
    }

    #[tokio::test]
    async fn unregister_clears_state_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = make_state(dir.path());
        state.register("%2", Some("abc"), now()).expect("register");
        state.register("%2", None, now()).expect("register");
        let payload = log_payload(serde_json::json!([
            string_attr("event.name", "codex.response"),
            string_attr("conversation_id", "abc"),
        ]));
        state.ingest(&payload, now()).await;
        assert!(dir.path().join("2.state").exists());

        state.unregister("%2", now()).await.expect("unregister");
        assert_eq!(state.registry.count(), 0);
        assert!(!dir.path().join("2.state").exists());
    }

    #[tokio::test]
    async fn ingest_counts_as_activity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = make_state(dir.path());
        let later = now() + chrono::Duration::seconds(120);
        state.ingest(&ExportPayload::default(), later).await;
        assert_eq!(state.registry.idle_for(later), chrono::Duration::zero());
    }
}
