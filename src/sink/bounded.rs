//! Memory sink whose persisted form keeps only the newest entries.

use serde_json::Value;

use super::memory::MemorySink;
use super::registry::{self, State};
use super::LogSink;
use crate::entry::Entry;
use crate::error::{LogError, Result};
use crate::level::Level;

/// Wraps a [`MemorySink`] and caps its serialized history at `limit` entries.
///
/// Appending never truncates; the cut happens when the sink is serialized,
/// keeping the `limit` most recent entries in append order. A non-positive
/// limit is accepted at construction and rejected with
/// [`LogError::InvalidConfiguration`] on serialization.
///
/// The serialized state is the wrapped memory sink's state (`ar`, `minLevel`,
/// `original`) plus `limit`.
///
/// # Example
///
/// ```
/// use sinkchain::{BoundedMemorySink, LogEntry, LogSink, MemorySink, TextEntry};
///
/// let mut sink = BoundedMemorySink::new(MemorySink::new(), 2);
/// for text in ["a", "b", "c"] {
///     sink = sink.with_entry(TextEntry::new().with_text(text)).unwrap();
/// }
///
/// let map = sink.serialized().unwrap();
/// let ar = map["state"]["ar"].as_array().unwrap();
/// assert_eq!(ar.len(), 2);
/// assert_eq!(ar[0]["text"], "b");
/// assert_eq!(ar[1]["text"], "c");
/// ```
#[derive(Debug, Clone)]
pub struct BoundedMemorySink {
    inner: MemorySink,
    limit: i64,
}

impl BoundedMemorySink {
    /// Registry tag.
    pub const TYPE_TAG: &'static str = "bounded-memory";

    /// Bound `inner` to `limit` serialized entries.
    pub fn new(inner: MemorySink, limit: i64) -> Self {
        BoundedMemorySink { inner, limit }
    }

    /// The configured limit.
    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// The wrapped memory sink, with every retained entry.
    pub fn inner(&self) -> &MemorySink {
        &self.inner
    }

    pub(crate) fn with_inner(&self, inner: MemorySink) -> Self {
        BoundedMemorySink {
            inner,
            limit: self.limit,
        }
    }

    fn checked_limit(&self) -> Result<usize> {
        usize::try_from(self.limit)
            .ok()
            .filter(|limit| *limit > 0)
            .ok_or_else(|| {
                LogError::InvalidConfiguration(format!(
                    "limit must be positive, got {}",
                    self.limit
                ))
            })
    }

    pub(crate) fn from_state(state: &State) -> Result<Self> {
        let limit = registry::read_int(state, "limit")?;
        let inner = MemorySink::from_state(state)?;
        Ok(BoundedMemorySink { inner, limit })
    }
}

impl LogSink for BoundedMemorySink {
    fn with_entry(&self, entry: impl Into<Entry>) -> Result<Self> {
        Ok(self.with_inner(self.inner.with_entry(entry)?))
    }

    fn with_min_level(&self, level: Level) -> Self {
        self.with_inner(self.inner.with_min_level(level))
    }

    fn min_level(&self) -> Level {
        self.inner.min_level()
    }

    fn created(&self) -> Self {
        self.with_inner(self.inner.created())
    }

    fn serialized(&self) -> Result<Value> {
        let limit = self.checked_limit()?;
        let mut state = self.inner.state(Some(limit))?;
        state.insert("limit".to_string(), Value::from(self.limit));
        Ok(registry::tagged(Self::TYPE_TAG, state))
    }

    fn deserialized(data: &Value) -> Result<Self> {
        registry::expect_tag(data, Self::TYPE_TAG).and_then(Self::from_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{LogEntry, TextEntry};
    use serde_json::json;

    fn filled(limit: i64, count: usize) -> BoundedMemorySink {
        (0..count).fold(BoundedMemorySink::new(MemorySink::new(), limit), |sink, i| {
            sink.with_entry(TextEntry::new().with_text(i.to_string()))
                .unwrap()
        })
    }

    #[test]
    fn test_serialized_keeps_newest() {
        let map = filled(3, 10).serialized().unwrap();
        let texts: Vec<_> = map["state"]["ar"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["text"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["7", "8", "9"]);
        assert_eq!(map["state"]["limit"], 3);
    }

    #[test]
    fn test_append_does_not_truncate() {
        let sink = filled(2, 5);
        assert_eq!(sink.inner().len(), 5);
    }

    #[test]
    fn test_fewer_than_limit() {
        let map = filled(5, 2).serialized().unwrap();
        assert_eq!(map["state"]["ar"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_non_positive_limit_rejected_on_serialize() {
        for limit in [0, -4] {
            let err = filled(limit, 1).serialized().unwrap_err();
            assert!(matches!(err, LogError::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn test_min_level_forwards_to_inner() {
        let sink = BoundedMemorySink::new(MemorySink::new(), 4).with_min_level(Level::ERROR);
        assert_eq!(sink.inner().min_level(), Level::ERROR);
        let sink = sink
            .with_entry(TextEntry::new().with_level(Level::INFO).with_text("x"))
            .unwrap();
        assert!(sink.inner().is_empty());
    }

    #[test]
    fn test_round_trip_keeps_only_limit() {
        let map = filled(2, 6).serialized().unwrap();
        let back = BoundedMemorySink::deserialized(&map).unwrap();
        assert_eq!(back.limit(), 2);
        assert_eq!(back.inner().len(), 2);
        assert_eq!(back.serialized().unwrap(), map);
    }

    #[test]
    fn test_missing_limit_is_malformed() {
        let data = json!({"typeTag": "bounded-memory", "state": {"ar": [], "minLevel": 1}});
        assert!(BoundedMemorySink::deserialized(&data).unwrap_err().is_malformed());
    }

    #[test]
    fn test_memory_tag_is_not_bounded() {
        let data = MemorySink::new().serialized().unwrap();
        assert!(BoundedMemorySink::deserialized(&data)
            .unwrap_err()
            .is_type_resolution());
    }

    #[test]
    fn test_created_keeps_limit() {
        let fresh = filled(3, 4).created();
        assert_eq!(fresh.limit(), 3);
        assert!(fresh.inner().is_empty());
    }
}
