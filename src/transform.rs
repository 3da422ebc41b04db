//! Transform adapters: normalized record tree to neutral entries.
//!
//! A timeline adapter returns every time-ordered element of a trace; a
//! snapshot adapter returns the whole tree as one entry. Entries keep the
//! order the trace stored them in.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::schema::{Record, Value};

/// One element of a decoded trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeutralEntry {
    pub timestamp: i64,
    pub name: String,
    pub payload: Record,
}

/// Output of a transform adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    Timeline { children: Vec<NeutralEntry> },
    Snapshot(NeutralEntry),
}

impl Transformed {
    pub fn into_entries(self) -> Vec<NeutralEntry> {
        match self {
            Transformed::Timeline { children } => children,
            Transformed::Snapshot(entry) => vec![entry],
        }
    }
}

/// Converts a normalized record tree into neutral entries.
pub trait TransformAdapter: Send + Sync {
    fn transform(&self, tree: Record) -> Result<Transformed>;
}

impl<F> TransformAdapter for F
where
    F: Fn(Record) -> Result<Transformed> + Send + Sync,
{
    fn transform(&self, tree: Record) -> Result<Transformed> {
        self(tree)
    }
}

/// How an entry gets its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// The value of the named field.
    Field(&'static str),
    /// Name of the first sub-record field that is set, e.g. the active
    /// member of a oneof.
    FirstPresentRecord,
}

/// Timeline adapter over a repeated field of entry records.
#[derive(Debug, Clone)]
pub struct EntriesAdapter {
    entries: &'static str,
    timestamp: &'static str,
    label: Label,
}

impl EntriesAdapter {
    pub fn new(entries: &'static str, timestamp: &'static str, label: Label) -> Self {
        Self {
            entries,
            timestamp,
            label,
        }
    }

    fn entry(&self, index: usize, record: &Record) -> Result<NeutralEntry> {
        let timestamp = match record.get(self.timestamp).and_then(Value::as_i64) {
            Some(ts) => ts,
            None => bail!(
                "{} entry {index} has no integer '{}' field",
                record.schema().name(),
                self.timestamp
            ),
        };
        let name = match self.label {
            Label::Field(field) => record
                .get(field)
                .filter(|v| !matches!(v, Value::Null))
                .map(ToString::to_string)
                .unwrap_or_default(),
            Label::FirstPresentRecord => record
                .fields()
                .find(|(_, value)| matches!(value, Value::Record(_)))
                .map(|(field, _)| field.name.clone())
                .unwrap_or_default(),
        };
        Ok(NeutralEntry {
            timestamp,
            name,
            payload: record.clone(),
        })
    }
}

impl TransformAdapter for EntriesAdapter {
    fn transform(&self, tree: Record) -> Result<Transformed> {
        let entries = match tree.get(self.entries) {
            Some(Value::List(items)) => items,
            _ => bail!(
                "{} has no repeated '{}' field",
                tree.schema().full_name,
                self.entries
            ),
        };

        let children = entries
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.as_record().map(|record| (i, record)))
            .map(|(i, record)| self.entry(i, record))
            .collect::<Result<Vec<_>>>()?;
        Ok(Transformed::Timeline { children })
    }
}

/// Snapshot adapter: the whole tree as one entry at timestamp 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotAdapter;

impl TransformAdapter for SnapshotAdapter {
    fn transform(&self, tree: Record) -> Result<Transformed> {
        Ok(Transformed::Snapshot(NeutralEntry {
            timestamp: 0,
            name: tree.schema().name().to_string(),
            payload: tree,
        }))
    }
}
