//! Core types for the record store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Collection fed by `POST /page`.
pub const PAGE: &str = "page";

/// Collection fed by `POST /all`.
pub const ALL: &str = "all";

/// Collection fed by the `/====<value>` catch-all route.
pub const HITS: &str = "hits";

/// Tag stored when a payload omits `tag`.
pub const DEFAULT_TAG: &str = "untagged";

/// Field names owned by [`Record`] itself; payloads can never shadow them.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "timestamp", "clientIp"];

/// Unique identifier for a record, global across every collection.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl RecordId {
    pub fn next(self) -> Self {
        RecordId(self.0.saturating_add(1))
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One logged event.
///
/// Serialized as a single flat JSON object: `id`, `timestamp`, `clientIp`
/// and then every payload field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "clientIp")]
    pub client_ip: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl Record {
    /// Get a payload field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Input for appending a record. The store assigns the id.
#[derive(Clone, Debug, Default)]
pub struct RecordInput {
    pub client_ip: String,
    /// Defaults to "now" when the store appends the record.
    pub timestamp: Option<DateTime<Utc>>,
    pub fields: BTreeMap<String, String>,
}

impl RecordInput {
    pub fn new(client_ip: impl Into<String>) -> Self {
        Self {
            client_ip: client_ip.into(),
            ..Default::default()
        }
    }

    /// Add a payload field. Reserved names are ignored.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if !is_reserved(&name) {
            self.fields.insert(name, value.into());
        }
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Build an input from a decoded request body.
    ///
    /// `ts` becomes the timestamp when it parses; every other scalar is
    /// coerced to a string payload field.
    pub fn from_payload(client_ip: impl Into<String>, payload: &serde_json::Map<String, Value>) -> Self {
        let mut input = Self::new(client_ip);
        for (name, value) in payload {
            if name == "ts" {
                input.timestamp = parse_timestamp(value);
                continue;
            }
            if let Some(text) = coerce_to_string(value) {
                input = input.with_field(name.as_str(), text);
            }
        }
        input
    }
}

/// Store statistics.
#[derive(Clone, Debug, Serialize)]
pub struct StoreStats {
    pub collections: BTreeMap<String, usize>,
    pub total_records: usize,
    pub next_id: u64,
    pub persist_failures: u64,
    pub snapshot_path: PathBuf,
}

/// Expected payload fields of a known collection and their defaults.
pub fn collection_defaults(collection: &str) -> &'static [(&'static str, &'static str)] {
    match collection {
        PAGE => &[("tag", DEFAULT_TAG), ("url", ""), ("cookies", "")],
        ALL => &[("tag", DEFAULT_TAG), ("host", ""), ("cookies", "")],
        HITS => &[("value", "")],
        _ => &[],
    }
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// Coerce a JSON value to a payload string. `null` yields nothing.
pub fn coerce_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Parse an RFC 3339 string or epoch milliseconds (number or numeric string).
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)
        }
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
