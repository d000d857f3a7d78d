//! # Sinkchain
//!
//! Immutable, composable log sinks with a self-describing persistence format.
//!
//! ## Philosophy
//!
//! A logger here is a **value**, not a service:
//! - Entries and sinks never change in place; every update returns a new value
//! - Sinks are built by decoration, each one wrapping an inner sink
//! - A whole chain, buffered entries included, flattens to nested tagged maps
//!   and comes back without the caller naming a single concrete kind
//!
//! ## Quick Example
//!
//! ```rust
//! use sinkchain::{Level, LogEntry, LogSink, MemorySink, Sink, TextEntry};
//!
//! let sink: Sink = MemorySink::new().with_min_level(Level::INFO).into();
//!
//! let sink = sink
//!     .with_entry(TextEntry::new().with_level(Level::DEBUG).with_text("x"))?
//!     .with_entry(TextEntry::new().with_level(Level::ERROR).with_text("y"))?;
//!
//! // Persist the chain...
//! let json = sink.to_json_string()?;
//!
//! // ...and rebuild it later without knowing what it was made of.
//! let restored = Sink::from_json_str(&json)?;
//! assert_eq!(restored.serialized()?, sink.serialized()?);
//! assert_eq!(restored.as_memory().map(|m| m.len()), Some(1));
//! # Ok::<(), sinkchain::LogError>(())
//! ```
//!
//! ## Features
//!
//! - `gzip` (default): compress structured payloads before base64
//! - `tracing` (default): emit diagnostic events for opens, closes, write
//!   failures and filtering decisions. No subscriber is ever installed.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod encode;
pub mod entry;
pub mod error;
pub mod format;
pub mod level;
pub mod sink;

// Re-exports
pub use entry::{
    Attributes, Entry, ErrorRecord, ExceptionEntry, LogEntry, StructuredEntry, TextEntry,
};
pub use error::{LogError, Result};
pub use format::{EntryFormatter, PlainFormatter};
pub use level::Level;
pub use sink::{
    BoundedMemorySink, FileMode, FileSink, FileTarget, LogSink, MemorySink, NullSink, Sink,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::entry::{Entry, ExceptionEntry, LogEntry, StructuredEntry, TextEntry};
    pub use crate::error::LogError;
    pub use crate::level::Level;
    pub use crate::sink::{BoundedMemorySink, FileMode, FileSink, LogSink, MemorySink, NullSink, Sink};
}
