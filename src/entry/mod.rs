//! Log entries
//!
//! An entry records one logged event: a [`Level`], a timestamp, an opaque
//! payload string and a map of named [`Attributes`]. Three kinds exist:
//!
//! - [`TextEntry`] stores a line of text (CR/LF escaped)
//! - [`StructuredEntry`] stores any `serde::Serialize` value through the
//!   [`encode`](crate::encode) pipeline
//! - [`ExceptionEntry`] stores a captured error chain as an [`ErrorRecord`]
//!
//! Entries are values. Every `with_*` call returns a new entry; fields that
//! were not touched are shared with the previous value, not cloned.
//!
//! An entry becomes *finalized* once its payload is set, which also stamps
//! it with the current time. Only finalized entries can be serialized.
//!
//! # Examples
//!
//! ```
//! use sinkchain::{Level, LogEntry, TextEntry};
//!
//! let entry = TextEntry::new()
//!     .with_level(Level::ERROR)
//!     .with_attr("request_id", 42)
//!     .with_text("disk full");
//!
//! let map = entry.serialized().unwrap();
//! assert_eq!(map["level"], 4);
//! assert_eq!(map["text"], "disk full");
//! ```

mod exception;
mod structured;
mod text;

pub use exception::{ErrorRecord, ExceptionEntry};
pub use structured::StructuredEntry;
pub use text::TextEntry;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, SecondsFormat, SubsecRound, Utc};
use serde_json::{json, Map, Value};

use crate::error::{LogError, Result};
use crate::level::Level;

/// Named attributes attached to an entry.
///
/// Keys are unique; the last write wins. The map is shared between entry
/// versions until one of them writes to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Arc<BTreeMap<String, Value>>);

impl Attributes {
    /// An empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a map with `name` set to `value`, leaving `self` untouched.
    pub fn with(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.0).insert(name.into(), value.into());
        next
    }

    /// Look up one attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns true when both maps share the same storage.
    pub fn ptr_eq(&self, other: &Attributes) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Operations every entry kind supports.
pub trait LogEntry: Sized {
    /// Returns the entry with its level replaced.
    fn with_level(&self, level: Level) -> Self;

    /// The entry's level.
    fn level(&self) -> Level;

    /// Returns the entry with one attribute set.
    fn with_attr(&self, name: impl Into<String>, value: impl Into<Value>) -> Self;

    /// The entry's attributes.
    fn attrs(&self) -> &Attributes;

    /// Flatten the entry to `{level, timestamp, text}`.
    ///
    /// Fails with [`LogError::InvalidState`] when the entry was never finalized.
    fn serialized(&self) -> Result<Value>;

    /// Returns true once payload and timestamp are set.
    fn is_finalized(&self) -> bool;
}

/// Payload and timestamp, set together or not at all.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Stamp {
    timestamp: DateTime<FixedOffset>,
    payload: String,
}

/// State shared by all entry kinds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Record {
    level: Level,
    stamp: Option<Arc<Stamp>>,
    attrs: Attributes,
}

impl Record {
    pub(crate) fn new(level: Level) -> Self {
        Record {
            level,
            stamp: None,
            attrs: Attributes::new(),
        }
    }

    pub(crate) fn level(&self) -> Level {
        self.level
    }

    pub(crate) fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub(crate) fn with_level(&self, level: Level) -> Self {
        Record {
            level,
            ..self.clone()
        }
    }

    pub(crate) fn with_attr(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Record {
            attrs: self.attrs.with(name, value),
            ..self.clone()
        }
    }

    /// Set the payload and stamp the record with the current time.
    pub(crate) fn stamped(&self, payload: String) -> Self {
        Record {
            stamp: Some(Arc::new(Stamp {
                timestamp: now(),
                payload,
            })),
            ..self.clone()
        }
    }

    pub(crate) fn is_finalized(&self) -> bool {
        self.stamp.is_some()
    }

    pub(crate) fn payload(&self) -> Option<&str> {
        self.stamp.as_deref().map(|s| s.payload.as_str())
    }

    pub(crate) fn serialized(&self) -> Result<Value> {
        let stamp = self.stamp.as_deref().ok_or_else(|| {
            LogError::InvalidState("entry has no payload or timestamp yet".to_string())
        })?;
        Ok(json!({
            "level": self.level.to_int(),
            "timestamp": stamp.timestamp.to_rfc3339_opts(SecondsFormat::Millis, false),
            "text": stamp.payload,
        }))
    }

    /// Rebuild a finalized record from `{level, timestamp, text}`.
    ///
    /// The legacy `dt` key is read when `timestamp` is absent.
    pub(crate) fn deserialized(data: &Value) -> Result<Self> {
        let map = data
            .as_object()
            .ok_or_else(|| LogError::InvalidData("entry is not a map".to_string()))?;
        let level = required(map, "level")?
            .as_i64()
            .ok_or_else(|| LogError::InvalidData("`level` is not an integer".to_string()))?;
        let raw_ts = map
            .get("timestamp")
            .or_else(|| map.get("dt"))
            .ok_or_else(|| LogError::InvalidData("missing key `timestamp`".to_string()))?
            .as_str()
            .ok_or_else(|| LogError::InvalidData("`timestamp` is not a string".to_string()))?;
        let timestamp = DateTime::parse_from_rfc3339(raw_ts).map_err(|e| {
            LogError::InvalidData(format!("unparsable timestamp `{}`: {}", raw_ts, e))
        })?;
        let payload = required(map, "text")?
            .as_str()
            .ok_or_else(|| LogError::InvalidData("`text` is not a string".to_string()))?;

        Ok(Record {
            level: Level::from_int(level),
            stamp: Some(Arc::new(Stamp {
                timestamp,
                payload: payload.to_string(),
            })),
            attrs: Attributes::new(),
        })
    }
}

fn required<'a>(map: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    map.get(key)
        .ok_or_else(|| LogError::InvalidData(format!("missing key `{}`", key)))
}

fn now() -> DateTime<FixedOffset> {
    // Millisecond precision keeps the serialized form stable across round trips.
    Utc::now().trunc_subsecs(3).fixed_offset()
}

/// Implements [`LogEntry`] for a kind that keeps its state in a `record` field.
macro_rules! impl_log_entry {
    ($kind:ty) => {
        impl $crate::entry::LogEntry for $kind {
            fn with_level(&self, level: $crate::level::Level) -> Self {
                Self {
                    record: self.record.with_level(level),
                }
            }

            fn level(&self) -> $crate::level::Level {
                self.record.level()
            }

            fn with_attr(
                &self,
                name: impl Into<String>,
                value: impl Into<serde_json::Value>,
            ) -> Self {
                Self {
                    record: self.record.with_attr(name, value),
                }
            }

            fn attrs(&self) -> &$crate::entry::Attributes {
                self.record.attrs()
            }

            fn serialized(&self) -> $crate::error::Result<serde_json::Value> {
                self.record.serialized()
            }

            fn is_finalized(&self) -> bool {
                self.record.is_finalized()
            }
        }
    };
}

pub(crate) use impl_log_entry;

/// Any entry kind, as stored by sinks.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// A text line.
    Text(TextEntry),
    /// An encoded structured value.
    Structured(StructuredEntry),
    /// An encoded error chain.
    Exception(ExceptionEntry),
}

impl Entry {
    /// Rebuild an entry from its serialized map.
    ///
    /// The serialized form carries no kind, so the result is a text entry
    /// holding the stored payload verbatim. Fails with
    /// [`LogError::InvalidData`] on missing keys or an unparsable timestamp.
    pub fn deserialized(data: &Value) -> Result<Self> {
        TextEntry::deserialized(data).map(Entry::Text)
    }

    /// The stored payload, if the entry is finalized.
    pub fn payload(&self) -> Option<&str> {
        self.record().payload()
    }

    fn record(&self) -> &Record {
        match self {
            Entry::Text(e) => &e.record,
            Entry::Structured(e) => &e.record,
            Entry::Exception(e) => &e.record,
        }
    }

    fn map_record(&self, f: impl FnOnce(&Record) -> Record) -> Self {
        match self {
            Entry::Text(_) => Entry::Text(TextEntry {
                record: f(self.record()),
            }),
            Entry::Structured(_) => Entry::Structured(StructuredEntry {
                record: f(self.record()),
            }),
            Entry::Exception(_) => Entry::Exception(ExceptionEntry {
                record: f(self.record()),
            }),
        }
    }
}

impl LogEntry for Entry {
    fn with_level(&self, level: Level) -> Self {
        self.map_record(|r| r.with_level(level))
    }

    fn level(&self) -> Level {
        self.record().level()
    }

    fn with_attr(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.map_record(|r| r.with_attr(name, value))
    }

    fn attrs(&self) -> &Attributes {
        self.record().attrs()
    }

    fn serialized(&self) -> Result<Value> {
        self.record().serialized()
    }

    fn is_finalized(&self) -> bool {
        self.record().is_finalized()
    }
}

impl From<TextEntry> for Entry {
    fn from(entry: TextEntry) -> Self {
        Entry::Text(entry)
    }
}

impl From<StructuredEntry> for Entry {
    fn from(entry: StructuredEntry) -> Self {
        Entry::Structured(entry)
    }
}

impl From<ExceptionEntry> for Entry {
    fn from(entry: ExceptionEntry) -> Self {
        Entry::Exception(entry)
    }
}

impl From<&Entry> for Entry {
    fn from(entry: &Entry) -> Self {
        entry.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_last_write_wins() {
        let attrs = Attributes::new().with("k", 1).with("k", 2);
        assert_eq!(attrs.get("k"), Some(&json!(2)));
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn test_attributes_copy_on_write() {
        let base = Attributes::new().with("a", "x");
        let copy = base.clone();
        assert!(base.ptr_eq(&copy));

        let next = base.with("b", "y");
        assert!(!base.ptr_eq(&next));
        assert_eq!(base.len(), 1);
        assert_eq!(next.len(), 2);
    }

    #[test]
    fn test_unfinalized_record_cannot_serialize() {
        let err = Record::new(Level::INFO).serialized().unwrap_err();
        assert!(matches!(err, LogError::InvalidState(_)));
    }

    #[test]
    fn test_record_round_trip() {
        let record = Record::new(Level::WARNING).stamped("payload".to_string());
        let map = record.serialized().unwrap();
        let back = Record::deserialized(&map).unwrap();
        assert_eq!(back.serialized().unwrap(), map);
        assert_eq!(back.level(), Level::WARNING);
    }

    #[test]
    fn test_deserialize_reads_legacy_dt_key() {
        let data = json!({"level": 1, "dt": "2020-05-01T10:00:00+03:00", "text": "t"});
        let record = Record::deserialized(&data).unwrap();
        assert_eq!(
            record.serialized().unwrap()["timestamp"],
            "2020-05-01T10:00:00.000+03:00"
        );
    }

    #[test]
    fn test_deserialize_missing_keys() {
        for data in [
            json!({"timestamp": "2020-05-01T10:00:00+00:00", "text": "t"}),
            json!({"level": 1, "text": "t"}),
            json!({"level": 1, "timestamp": "2020-05-01T10:00:00+00:00"}),
            json!("not a map"),
        ] {
            let err = Record::deserialized(&data).unwrap_err();
            assert!(err.is_invalid_data(), "{:?}", data);
        }
    }

    #[test]
    fn test_deserialize_bad_timestamp() {
        let data = json!({"level": 1, "timestamp": "yesterday", "text": "t"});
        assert!(Record::deserialized(&data).unwrap_err().is_invalid_data());
    }

    #[test]
    fn test_entry_enum_delegates() {
        let entry: Entry = TextEntry::new().with_text("x").into();
        let louder = entry.with_level(Level::CRITICAL).with_attr("k", true);
        assert!(matches!(louder, Entry::Text(_)));
        assert_eq!(louder.level(), Level::CRITICAL);
        assert_eq!(louder.attrs().get("k"), Some(&json!(true)));
        assert_eq!(entry.level(), Level::INFO);
        assert_eq!(louder.payload(), Some("x"));
    }
}
