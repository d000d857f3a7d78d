//! Sink chains
//!
//! A sink is an immutable log destination. Sinks are built by decoration:
//! every sink except [`NullSink`] wraps exactly one inner sink (its
//! *original*) and forwards every entry to it before deciding, by its own
//! minimum level, whether to keep the entry itself.
//!
//! ```text
//! FileSink ──original──▶ MemorySink ──original──▶ NullSink
//! ```
//!
//! Every operation returns a new chain value. Untouched parts of the chain
//! are shared with the old value through `Arc`, so an update costs time
//! proportional to the path it touches.
//!
//! # Kinds
//!
//! | Kind | Tag | Keeps |
//! |------|-----|-------|
//! | [`NullSink`] | `null` | nothing |
//! | [`MemorySink`] | `memory` | entries at or above its minimum level |
//! | [`BoundedMemorySink`] | `bounded-memory` | its wrapped memory sink's entries, cut to `limit` when serialized |
//! | [`FileSink`] | `file` | nothing in memory, one formatted line per qualifying entry on disk |
//!
//! # Persistence
//!
//! [`LogSink::serialized`] flattens a chain into nested tagged maps and
//! [`Sink::deserialized`] rebuilds it without knowing the kinds in advance.
//!
//! ```
//! use sinkchain::{Level, LogEntry, LogSink, MemorySink, Sink, TextEntry};
//!
//! let sink = Sink::from(MemorySink::new().with_min_level(Level::INFO))
//!     .with_entry(TextEntry::new().with_level(Level::DEBUG).with_text("x"))
//!     .unwrap()
//!     .with_entry(TextEntry::new().with_level(Level::ERROR).with_text("y"))
//!     .unwrap();
//!
//! let map = sink.serialized().unwrap();
//! assert_eq!(map["state"]["ar"].as_array().unwrap().len(), 1);
//! assert_eq!(map["state"]["ar"][0]["text"], "y");
//!
//! let restored = Sink::deserialized(&map).unwrap();
//! assert_eq!(restored.serialized().unwrap(), map);
//! ```

mod bounded;
mod file;
mod history;
mod memory;
mod null;
pub mod registry;

pub use bounded::BoundedMemorySink;
pub use file::{FileMode, FileSink, FileTarget, STREAM_PREFIX};
pub use memory::MemorySink;
pub use null::NullSink;

use std::sync::Arc;

use serde_json::Value;

use crate::entry::Entry;
use crate::error::{LogError, Result};
use crate::level::Level;

/// Operations every sink kind supports.
pub trait LogSink: Sized {
    /// Returns the sink with `entry` appended at every layer that accepts it.
    ///
    /// The inner sink always sees the entry; this layer keeps it only when
    /// its level is at or above [`LogSink::min_level`].
    fn with_entry(&self, entry: impl Into<Entry>) -> Result<Self>;

    /// Returns the sink with a new threshold.
    fn with_min_level(&self, level: Level) -> Self;

    /// The threshold below which this layer drops entries.
    fn min_level(&self) -> Level;

    /// A sink of the same kind and configuration, wrapping the same inner
    /// sink, with no accumulated entries.
    fn created(&self) -> Self;

    /// Flatten the sink to `{typeTag, state}`.
    fn serialized(&self) -> Result<Value>;

    /// Rebuild the sink from `{typeTag, state}`.
    fn deserialized(data: &Value) -> Result<Self>;
}

/// Any sink kind. Wrapping sinks hold their inner sink as a `Sink`.
#[derive(Debug, Clone)]
pub enum Sink {
    /// Discards everything.
    Null(NullSink),
    /// Keeps entries in memory.
    Memory(MemorySink),
    /// Keeps entries in memory, persists only the newest ones.
    Bounded(BoundedMemorySink),
    /// Writes entries to a file or process stream.
    File(FileSink),
}

impl Sink {
    /// The registry tag of this sink's kind.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Sink::Null(_) => NullSink::TYPE_TAG,
            Sink::Memory(_) => MemorySink::TYPE_TAG,
            Sink::Bounded(_) => BoundedMemorySink::TYPE_TAG,
            Sink::File(_) => FileSink::TYPE_TAG,
        }
    }

    /// The sink this one wraps, `None` for a null sink.
    pub fn original(&self) -> Option<&Sink> {
        match self {
            Sink::Null(_) => None,
            Sink::Memory(s) => Some(s.original()),
            Sink::Bounded(s) => Some(s.inner().original()),
            Sink::File(s) => Some(s.original()),
        }
    }

    /// Close every opened file layer in the chain.
    pub fn closed(&self) -> Result<Sink> {
        let rewrap = |original: &Sink| -> Result<Arc<Sink>> { original.closed().map(Arc::new) };
        Ok(match self {
            Sink::Null(s) => Sink::Null(*s),
            Sink::Memory(s) => Sink::Memory(s.with_original_arc(rewrap(s.original())?)),
            Sink::Bounded(s) => {
                let inner = s.inner().with_original_arc(rewrap(s.inner().original())?);
                Sink::Bounded(s.with_inner(inner))
            }
            Sink::File(s) => {
                let closed = s.closed()?;
                Sink::File(closed.with_original_arc(rewrap(s.original())?))
            }
        })
    }

    /// The memory sink, if this is one.
    pub fn as_memory(&self) -> Option<&MemorySink> {
        match self {
            Sink::Memory(s) => Some(s),
            _ => None,
        }
    }

    /// The bounded memory sink, if this is one.
    pub fn as_bounded(&self) -> Option<&BoundedMemorySink> {
        match self {
            Sink::Bounded(s) => Some(s),
            _ => None,
        }
    }

    /// The file sink, if this is one.
    pub fn as_file(&self) -> Option<&FileSink> {
        match self {
            Sink::File(s) => Some(s),
            _ => None,
        }
    }

    /// Serialize the chain to a JSON string.
    pub fn to_json_string(&self) -> Result<String> {
        let value = self.serialized()?;
        serde_json::to_string(&value).map_err(|e| LogError::MalformedData(e.to_string()))
    }

    /// Rebuild a chain from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Sink> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| LogError::MalformedData(e.to_string()))?;
        Sink::deserialized(&value)
    }
}

impl Default for Sink {
    fn default() -> Self {
        Sink::Null(NullSink)
    }
}

impl LogSink for Sink {
    fn with_entry(&self, entry: impl Into<Entry>) -> Result<Self> {
        let entry = entry.into();
        Ok(match self {
            Sink::Null(s) => Sink::Null(s.with_entry(entry)?),
            Sink::Memory(s) => Sink::Memory(s.with_entry(entry)?),
            Sink::Bounded(s) => Sink::Bounded(s.with_entry(entry)?),
            Sink::File(s) => Sink::File(s.with_entry(entry)?),
        })
    }

    fn with_min_level(&self, level: Level) -> Self {
        match self {
            Sink::Null(s) => Sink::Null(s.with_min_level(level)),
            Sink::Memory(s) => Sink::Memory(s.with_min_level(level)),
            Sink::Bounded(s) => Sink::Bounded(s.with_min_level(level)),
            Sink::File(s) => Sink::File(s.with_min_level(level)),
        }
    }

    fn min_level(&self) -> Level {
        match self {
            Sink::Null(s) => s.min_level(),
            Sink::Memory(s) => s.min_level(),
            Sink::Bounded(s) => s.min_level(),
            Sink::File(s) => s.min_level(),
        }
    }

    fn created(&self) -> Self {
        match self {
            Sink::Null(s) => Sink::Null(s.created()),
            Sink::Memory(s) => Sink::Memory(s.created()),
            Sink::Bounded(s) => Sink::Bounded(s.created()),
            Sink::File(s) => Sink::File(s.created()),
        }
    }

    fn serialized(&self) -> Result<Value> {
        match self {
            Sink::Null(s) => s.serialized(),
            Sink::Memory(s) => s.serialized(),
            Sink::Bounded(s) => s.serialized(),
            Sink::File(s) => s.serialized(),
        }
    }

    /// Resolve the tag through the registry and rebuild the whole chain.
    ///
    /// Fails with [`LogError::TypeResolution`] for unknown tags and with
    /// [`LogError::MalformedData`] when required keys are missing or
    /// mis-shaped at any depth.
    fn deserialized(data: &Value) -> Result<Self> {
        registry::deserialize_any(data)
    }
}

impl From<NullSink> for Sink {
    fn from(sink: NullSink) -> Self {
        Sink::Null(sink)
    }
}

impl From<MemorySink> for Sink {
    fn from(sink: MemorySink) -> Self {
        Sink::Memory(sink)
    }
}

impl From<BoundedMemorySink> for Sink {
    fn from(sink: BoundedMemorySink) -> Self {
        Sink::Bounded(sink)
    }
}

impl From<FileSink> for Sink {
    fn from(sink: FileSink) -> Self {
        Sink::File(sink)
    }
}
