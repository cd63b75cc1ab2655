//! Snapshot encoding and lenient decoding.
//!
//! The snapshot is a JSON object with one array per collection:
//!
//! ```text
//! { "page": [ {"id": 1, "timestamp": "...", "clientIp": "...", "url": "..."} ],
//!   "all":  [],
//!   "hits": [] }
//! ```
//!
//! Decoding never rejects a document because of a single bad field. A
//! collection that is not an array becomes empty, records without a
//! well-formed id get one backfilled, and a legacy flat array of
//! `{ip, value, time}` hits is read into the `hits` collection.

use crate::error::{Result, StoreError};
use crate::records::Collection;
use crate::types::{coerce_to_string, is_reserved, parse_timestamp, Record, RecordId, HITS};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Keys read into a record's timestamp, in priority order.
const TIMESTAMP_KEYS: [&str; 3] = ["timestamp", "ts", "time"];

/// Keys read into a record's client IP, in priority order.
const CLIENT_IP_KEYS: [&str; 2] = ["clientIp", "ip"];

/// Largest id accepted from a snapshot. Larger ids are backfilled, which
/// keeps the counter far away from `u64` overflow.
pub const MAX_SNAPSHOT_ID: u64 = (1 << 53) - 1;

/// Result of decoding a snapshot.
#[derive(Debug)]
pub struct DecodedSnapshot {
    /// Collections in document order.
    pub collections: Vec<(String, Collection)>,
    /// One past the highest id seen or assigned.
    pub next_id: RecordId,
    /// Records that received a backfilled id.
    pub backfilled: usize,
    /// Entries dropped because they were not JSON objects.
    pub dropped: usize,
}

/// Decode a snapshot document.
///
/// Fails only when the bytes are not JSON at all, or the top level is
/// neither an object nor an array.
pub fn decode_snapshot(bytes: &[u8]) -> Result<DecodedSnapshot> {
    let document: Value = serde_json::from_slice(bytes)?;

    let raw: Vec<(String, Vec<Value>)> = match document {
        Value::Object(map) => map
            .into_iter()
            .map(|(name, value)| match value {
                Value::Array(entries) => (name, entries),
                other => {
                    tracing::warn!(
                        collection = %name,
                        kind = json_kind(&other),
                        "Snapshot collection is not an array, treating as empty"
                    );
                    (name, Vec::new())
                }
            })
            .collect(),
        Value::Array(entries) => vec![(HITS.to_string(), entries)],
        other => {
            return Err(StoreError::InvalidFormat(format!(
                "expected object or array at top level, found {}",
                json_kind(&other)
            )))
        }
    };

    // Seed the backfill counter at the largest id anywhere in the file.
    let mut counter = raw
        .iter()
        .flat_map(|(_, entries)| entries.iter())
        .filter_map(|entry| snapshot_id(entry.get("id")))
        .max()
        .unwrap_or(0);

    let mut decoded = DecodedSnapshot {
        collections: Vec::with_capacity(raw.len()),
        next_id: RecordId(1),
        backfilled: 0,
        dropped: 0,
    };

    for (name, entries) in raw {
        let mut collection = Collection::new();
        for entry in entries {
            let Value::Object(fields) = entry else {
                decoded.dropped += 1;
                continue;
            };

            let id = match snapshot_id(fields.get("id")) {
                Some(id) => id,
                None => {
                    counter = counter.saturating_add(1);
                    decoded.backfilled += 1;
                    counter
                }
            };

            collection.push(decode_record(RecordId(id), &fields));
        }
        decoded.collections.push((name, collection));
    }

    decoded.next_id = RecordId(counter).next();

    if decoded.dropped > 0 {
        tracing::warn!(dropped = decoded.dropped, "Dropped non-object snapshot entries");
    }

    Ok(decoded)
}

/// A well-formed snapshot id: an integer no larger than [`MAX_SNAPSHOT_ID`].
fn snapshot_id(value: Option<&Value>) -> Option<u64> {
    value
        .and_then(Value::as_u64)
        .filter(|id| *id <= MAX_SNAPSHOT_ID)
}

fn decode_record(id: RecordId, fields: &Map<String, Value>) -> Record {
    let (timestamp_key, timestamp) = TIMESTAMP_KEYS
        .iter()
        .find_map(|key| fields.get(*key).and_then(parse_timestamp).map(|ts| (*key, ts)))
        .map_or((None, Utc::now()), |(key, ts)| (Some(key), ts));

    let (client_ip_key, client_ip) = CLIENT_IP_KEYS
        .iter()
        .find_map(|key| fields.get(*key).and_then(coerce_to_string).map(|ip| (*key, ip)))
        .map_or((None, String::new()), |(key, ip)| (Some(key), ip));

    // Legacy aliases are consumed only when they were the source; otherwise
    // they are ordinary payload fields.
    let payload = fields
        .iter()
        .filter(|(key, _)| {
            let key = key.as_str();
            !is_reserved(key) && Some(key) != timestamp_key && Some(key) != client_ip_key
        })
        .filter_map(|(key, value)| coerce_to_string(value).map(|v| (key.clone(), v)))
        .collect();

    Record {
        id,
        timestamp,
        client_ip,
        fields: payload,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Encode collections as a pretty-printed snapshot document.
pub fn encode_snapshot(collections: &BTreeMap<String, Collection>) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(collections).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Read and decode the snapshot at `path`. A missing file yields `None`.
pub fn read_snapshot(path: &Path) -> Result<Option<DecodedSnapshot>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    decode_snapshot(&bytes).map(Some)
}

/// Replace the snapshot at `path` with `bytes`.
///
/// Writes a sibling `.tmp` file, syncs it, then renames it over the target
/// so readers never observe a truncated document.
pub fn write_snapshot(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = tmp_path_for(path);
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
