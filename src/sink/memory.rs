//! In-memory sink.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::history::History;
use super::registry::{self, State};
use super::{LogSink, Sink};
use crate::entry::{Entry, LogEntry};
use crate::error::Result;
use crate::level::Level;

/// Keeps entries at or above its minimum level, in append order.
///
/// Retained entries live in a persistent list: appending shares every
/// earlier entry with the previous sink value.
///
/// # Example
///
/// ```
/// use sinkchain::{Level, LogEntry, LogSink, MemorySink, TextEntry};
///
/// let sink = MemorySink::new()
///     .with_entry(TextEntry::new().with_level(Level::DEBUG).with_text("noise"))
///     .unwrap()
///     .with_entry(TextEntry::new().with_level(Level::ERROR).with_text("signal"))
///     .unwrap();
///
/// assert_eq!(sink.len(), 1);
/// assert_eq!(sink.entries()[0].level(), Level::ERROR);
/// ```
#[derive(Debug, Clone)]
pub struct MemorySink {
    entries: History,
    min_level: Level,
    original: Arc<Sink>,
}

impl MemorySink {
    /// Registry tag.
    pub const TYPE_TAG: &'static str = "memory";

    /// An empty memory sink at [`Level::INFO`] wrapping a null sink.
    pub fn new() -> Self {
        Self::wrapping(Sink::default())
    }

    /// An empty memory sink at [`Level::INFO`] wrapping `original`.
    pub fn wrapping(original: impl Into<Sink>) -> Self {
        MemorySink {
            entries: History::new(),
            min_level: Level::INFO,
            original: Arc::new(original.into()),
        }
    }

    /// Retained entries, oldest first.
    pub fn entries(&self) -> Vec<&Entry> {
        self.entries.to_vec()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing was retained.
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    /// The wrapped sink.
    pub fn original(&self) -> &Sink {
        &self.original
    }

    /// Returns the sink wrapping `original` instead, entries kept.
    pub fn with_original(&self, original: impl Into<Sink>) -> Self {
        self.with_original_arc(Arc::new(original.into()))
    }

    pub(crate) fn with_original_arc(&self, original: Arc<Sink>) -> Self {
        MemorySink {
            original,
            ..self.clone()
        }
    }

    /// State map with `ar` cut to the newest `keep` entries when given.
    pub(crate) fn state(&self, keep: Option<usize>) -> Result<State> {
        let retained = match keep {
            Some(n) => self.entries.last(n),
            None => self.entries.to_vec(),
        };
        let ar = retained
            .into_iter()
            .map(|entry| entry.serialized())
            .collect::<Result<Vec<_>>>()?;

        let mut state = Map::new();
        state.insert("ar".to_string(), Value::Array(ar));
        state.insert("minLevel".to_string(), Value::from(self.min_level.to_int()));
        state.insert("original".to_string(), self.original.serialized()?);
        Ok(state)
    }

    pub(crate) fn from_state(state: &State) -> Result<Self> {
        let min_level = registry::read_min_level(state)?;
        let entries = registry::read_entries(state)?;
        let original = registry::read_original(state)?;
        Ok(MemorySink {
            entries: entries.into_iter().collect(),
            min_level,
            original: Arc::new(original),
        })
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for MemorySink {
    fn with_entry(&self, entry: impl Into<Entry>) -> Result<Self> {
        let entry = entry.into();
        let original = Arc::new(self.original.with_entry(entry.clone())?);
        if entry.level().is_below(self.min_level) {
            #[cfg(feature = "tracing")]
            tracing::trace!(level = %entry.level(), min_level = %self.min_level, "memory sink skipped entry");
            return Ok(self.with_original_arc(original));
        }
        Ok(MemorySink {
            entries: self.entries.pushed(entry),
            min_level: self.min_level,
            original,
        })
    }

    fn with_min_level(&self, level: Level) -> Self {
        MemorySink {
            min_level: level,
            ..self.clone()
        }
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    fn created(&self) -> Self {
        MemorySink {
            entries: History::new(),
            ..self.clone()
        }
    }

    fn serialized(&self) -> Result<Value> {
        Ok(registry::tagged(Self::TYPE_TAG, self.state(None)?))
    }

    fn deserialized(data: &Value) -> Result<Self> {
        registry::expect_tag(data, Self::TYPE_TAG).and_then(Self::from_state)
    }
}
