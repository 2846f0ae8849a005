//! Attribute extraction from OTLP tagged values.
//!
//! OTLP/JSON wraps every attribute value in a one-field object
//! (`{"stringValue": "..."}`, `{"intValue": "42"}`, ...). Only string,
//! integer and boolean values carry meaning for classification; every
//! other kind is dropped at extraction time.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

/// Attribute key holding the event name on log-shaped records.
pub const EVENT_NAME_KEY: &str = "event.name";

/// Preferred conversation identity attribute.
pub const CONVERSATION_ID_KEY: &str = "conversation_id";

/// Fallback conversation identity attribute.
pub const SESSION_ID_KEY: &str = "session_id";

// ─── Raw (wire) shapes ───────────────────────────────────────────

/// A single `{key, value}` entry of a record's `attributes` list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawAttribute {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: RawValue,
}

/// OTLP `AnyValue`, restricted to the fields we read.
///
/// Fields stay untyped until extraction so one mistyped value drops only its
/// own attribute, not the whole export. `intValue` is a JSON string in
/// canonical OTLP/JSON (int64 does not fit a JSON number) but some exporters
/// emit a plain number.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawValue {
    #[serde(default)]
    pub string_value: Option<serde_json::Value>,
    #[serde(default)]
    pub int_value: Option<serde_json::Value>,
    #[serde(default)]
    pub bool_value: Option<serde_json::Value>,
}

// ─── Typed values ────────────────────────────────────────────────

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    /// Any other kind (double, bytes, array, kvlist, empty). Never stored.
    Unsupported,
}

impl AttributeValue {
    /// First populated field wins: `stringValue`, then `intValue`, then
    /// `boolValue`. A populated field of the wrong JSON type is unsupported.
    pub fn from_raw(raw: &RawValue) -> Self {
        if let Some(v) = &raw.string_value {
            return v.as_str().map_or(Self::Unsupported, |s| Self::String(s.to_string()));
        }
        if let Some(v) = &raw.int_value {
            return coerce_int(v).map_or(Self::Unsupported, Self::Integer);
        }
        if let Some(v) = &raw.bool_value {
            return v.as_bool().map_or(Self::Unsupported, Self::Boolean);
        }
        Self::Unsupported
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Non-empty string, non-zero integer, or `true`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::String(s) => !s.is_empty(),
            Self::Integer(i) => *i != 0,
            Self::Boolean(b) => *b,
            Self::Unsupported => false,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Boolean(true) => f.write_str("true"),
            Self::Boolean(false) => f.write_str("false"),
            Self::Unsupported => Ok(()),
        }
    }
}

fn coerce_int(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ─── Attribute map ───────────────────────────────────────────────

/// Flat key → scalar map for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    values: HashMap<String, AttributeValue>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. `Unsupported` is discarded and leaves any previous
    /// value for the key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) {
        if value == AttributeValue::Unsupported {
            return;
        }
        self.values.insert(key.into(), value);
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttributeValue::as_str)
    }

    pub fn is_truthy(&self, key: &str) -> bool {
        self.get(key).is_some_and(AttributeValue::is_truthy)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Event name: the `event.name` attribute, else the record's own `name`.
    /// Empty values count as absent.
    pub fn event_name<'a>(&'a self, record_name: Option<&'a str>) -> Option<&'a str> {
        self.get_str(EVENT_NAME_KEY)
            .filter(|s| !s.is_empty())
            .or_else(|| record_name.filter(|s| !s.is_empty()))
    }

    /// Conversation identity: `conversation_id`, else `session_id`.
    pub fn conversation_id(&self) -> Option<&str> {
        self.get_str(CONVERSATION_ID_KEY)
            .filter(|s| !s.is_empty())
            .or_else(|| self.get_str(SESSION_ID_KEY).filter(|s| !s.is_empty()))
    }
}

/// Build an [`AttributeMap`] from a raw attribute list, dropping
/// unsupported kinds. Later duplicates overwrite earlier ones.
pub fn extract_attributes(raw: &[RawAttribute]) -> AttributeMap {
    let mut map = AttributeMap::new();
    for attr in raw {
        map.insert(attr.key.clone(), AttributeValue::from_raw(&attr.value));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_attrs(value: serde_json::Value) -> Vec<RawAttribute> {
        serde_json::from_value(value).expect("valid attribute list")
    }

    #[test]
    fn extracts_supported_kinds() {
        let attrs = extract_attributes(&raw_attrs(json!([
            {"key": "model", "value": {"stringValue": "gpt-5"}},
            {"key": "tokens", "value": {"intValue": "1234"}},
            {"key": "retries", "value": {"intValue": 3}},
            {"key": "success", "value": {"boolValue": false}},
        ])));

        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs.get_str("model"), Some("gpt-5"));
        assert_eq!(attrs.get("tokens"), Some(&AttributeValue::Integer(1234)));
        assert_eq!(attrs.get("retries"), Some(&AttributeValue::Integer(3)));
        assert_eq!(attrs.get("success"), Some(&AttributeValue::Boolean(false)));
    }

    #[test]
    fn unsupported_kinds_vanish() {
        let attrs = extract_attributes(&raw_attrs(json!([
            {"key": "latency", "value": {"doubleValue": 1.5}},
            {"key": "tags", "value": {"arrayValue": {"values": []}}},
            {"key": "blob", "value": {"bytesValue": "AAEC"}},
            {"key": "empty", "value": {}},
            {"key": "missing"},
        ])));
        assert!(attrs.is_empty());
    }

    #[test]
    fn string_value_takes_precedence() {
        let raw = RawValue {
            string_value: Some(json!("s")),
            int_value: Some(json!(7)),
            bool_value: Some(json!(true)),
        };
        assert_eq!(
            AttributeValue::from_raw(&raw),
            AttributeValue::String("s".to_string())
        );
    }

    #[test]
    fn unparseable_int_is_unsupported() {
        let raw = RawValue {
            int_value: Some(json!("not-a-number")),
            ..Default::default()
        };
        assert_eq!(AttributeValue::from_raw(&raw), AttributeValue::Unsupported);
    }

    #[test]
    fn mistyped_values_are_dropped() {
        let attrs = extract_attributes(&raw_attrs(json!([
            {"key": "flag", "value": {"boolValue": "true"}},
            {"key": "model", "value": {"stringValue": 5}},
            {"key": "tool", "value": {"stringValue": "edit"}},
        ])));
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get_str("tool"), Some("edit"));
    }

    #[test]
    fn unsupported_duplicate_keeps_previous_value() {
        let attrs = extract_attributes(&raw_attrs(json!([
            {"key": "tool", "value": {"stringValue": "edit"}},
            {"key": "tool", "value": {"doubleValue": 2.0}},
        ])));
        assert_eq!(attrs.get_str("tool"), Some("edit"));
    }

    #[test]
    fn event_name_prefers_attribute_then_record_name() {
        let attrs = AttributeMap::new().with(
            EVENT_NAME_KEY,
            AttributeValue::String("codex.response".to_string()),
        );
        assert_eq!(attrs.event_name(Some("span")), Some("codex.response"));

        let empty = AttributeMap::new().with(EVENT_NAME_KEY, AttributeValue::String(String::new()));
        assert_eq!(empty.event_name(Some("span")), Some("span"));
        assert_eq!(empty.event_name(Some("")), None);
        assert_eq!(AttributeMap::new().event_name(None), None);
    }

    #[test]
    fn conversation_id_falls_back_to_session_id() {
        let both = AttributeMap::new()
            .with(CONVERSATION_ID_KEY, AttributeValue::String("conv".to_string()))
            .with(SESSION_ID_KEY, AttributeValue::String("sess".to_string()));
        assert_eq!(both.conversation_id(), Some("conv"));

        let session_only =
            AttributeMap::new().with(SESSION_ID_KEY, AttributeValue::String("sess".to_string()));
        assert_eq!(session_only.conversation_id(), Some("sess"));

        assert_eq!(AttributeMap::new().conversation_id(), None);
    }

    #[test]
    fn truthiness() {
        assert!(AttributeValue::String("x".into()).is_truthy());
        assert!(!AttributeValue::String(String::new()).is_truthy());
        assert!(AttributeValue::Integer(2).is_truthy());
        assert!(!AttributeValue::Integer(0).is_truthy());
        assert!(AttributeValue::Boolean(true).is_truthy());
        assert!(!AttributeValue::Boolean(false).is_truthy());
    }
}
