//! Ordered record collection.

use crate::types::{Record, RecordId};
use serde::{Deserialize, Serialize};

/// An ordered sequence of records, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection {
    records: Vec<Record>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Append a record at the end.
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Remove every record with the given id. Returns how many were removed.
    pub fn remove(&mut self, id: RecordId) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        before - self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in storage order (oldest first).
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Records most recent first.
    pub fn newest_first(&self) -> Vec<Record> {
        self.records.iter().rev().cloned().collect()
    }

    /// Largest id in the collection.
    pub fn max_id(&self) -> Option<RecordId> {
        self.records.iter().map(|r| r.id).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn record(id: u64) -> Record {
        Record {
            id: RecordId(id),
            timestamp: Utc::now(),
            client_ip: "127.0.0.1".into(),
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn test_push_and_order() {
        let mut c = Collection::new();
        c.push(record(1));
        c.push(record(2));
        c.push(record(3));

        let ids: Vec<u64> = c.records().iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let newest: Vec<u64> = c.newest_first().iter().map(|r| r.id.0).collect();
        assert_eq!(newest, vec![3, 2, 1]);
        assert_eq!(c.max_id(), Some(RecordId(3)));
    }

    #[test]
    fn test_remove_counts_duplicates() {
        let mut c = Collection::from_records(vec![record(1), record(2), record(2)]);

        assert_eq!(c.remove(RecordId(9)), 0);
        assert_eq!(c.remove(RecordId(2)), 2);
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut c = Collection::from_records(vec![record(1)]);
        c.clear();
        assert!(c.is_empty());
        assert_eq!(c.max_id(), None);
    }
}
