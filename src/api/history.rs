use serde::Serialize;
use serde_json::Value;

use super::{FlatHistoryItem, HistoryIndexPayload};

/// Bucket assigned to entries from a flat (unbucketed) history payload.
pub const FLAT_BUCKET: &str = "All";

/// Recency buckets in display order.
pub const KNOWN_BUCKETS: [&str; 4] = ["Today", "Last Week", "Last Month", "Older"];

/// One navigable session in the history catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub bucket: String,
    pub title: String,
    pub handle: String,
}

impl HistoryEntry {
    fn new(bucket: &str, title: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            bucket: bucket.to_string(),
            title: title.into(),
            handle: handle.into(),
        }
    }
}

/// Collapse either `/api/history` shape into one ordered list.
pub fn normalize_history_index(payload: HistoryIndexPayload) -> Vec<HistoryEntry> {
    match payload {
        HistoryIndexPayload::Flat(items) => {
            let mut entries = Vec::new();
            list_entries(FLAT_BUCKET, items, &mut entries);
            entries
        }
        HistoryIndexPayload::Bucketed(buckets) => {
            let mut ordered: Vec<(String, Value)> = buckets.into_iter().collect();
            ordered.sort_by(|(a, _), (b, _)| bucket_rank(a).cmp(&bucket_rank(b)).then(a.cmp(b)));

            let mut entries = Vec::new();
            for (bucket, value) in ordered {
                bucket_entries(&bucket, value, &mut entries);
            }
            entries
        }
    }
}

fn bucket_rank(bucket: &str) -> usize {
    KNOWN_BUCKETS
        .iter()
        .position(|known| *known == bucket)
        .unwrap_or(KNOWN_BUCKETS.len())
}

fn flat_entry(bucket: &str, item: FlatHistoryItem) -> HistoryEntry {
    match item {
        FlatHistoryItem::Pair(Some(title), handle) => HistoryEntry::new(bucket, title, handle),
        FlatHistoryItem::Pair(None, handle) => HistoryEntry::new(bucket, handle.clone(), handle),
        FlatHistoryItem::Handle(handle) => HistoryEntry::new(bucket, handle.clone(), handle),
    }
}

fn bucket_entries(bucket: &str, value: Value, out: &mut Vec<HistoryEntry>) {
    match value {
        // title -> handle
        Value::Object(map) => {
            let mut pairs: Vec<(String, Value)> = map.into_iter().collect();
            pairs.sort_by(|(a, _), (b, _)| a.cmp(b));
            for (title, handle) in pairs {
                match handle {
                    Value::String(handle) => out.push(HistoryEntry::new(bucket, title, handle)),
                    other => {
                        tracing::debug!(bucket, %title, value = %other, "skipping non-string history handle")
                    }
                }
            }
        }
        Value::Array(items) => list_entries(bucket, items, out),
        Value::Null => {}
        other => tracing::debug!(bucket, value = %other, "skipping unrecognised history bucket"),
    }
}

fn list_entries(bucket: &str, items: Vec<Value>, out: &mut Vec<HistoryEntry>) {
    for item in items {
        match serde_json::from_value::<FlatHistoryItem>(item) {
            Ok(item) => out.push(flat_entry(bucket, item)),
            Err(err) => tracing::debug!(bucket, %err, "skipping unrecognised history item"),
        }
    }
}
