//! Rendering entries as display lines.
//!
//! File sinks turn every entry they persist into one line through an
//! [`EntryFormatter`]. The default [`PlainFormatter`] produces
//! `"<timestamp>\t<level name padded to 7>\t<text>\n"`, with the level name
//! right-aligned in its column (`"   INFO"`).

use std::fmt;

use serde_json::Value;

use crate::entry::{Entry, LogEntry};
use crate::error::{LogError, Result};
use crate::level::Level;

/// Turns a finalized entry into one output line, newline included.
pub trait EntryFormatter: fmt::Debug + Send + Sync {
    /// Render `entry`.
    ///
    /// Fails with [`LogError::InvalidData`] when the entry's serialized form
    /// lacks `timestamp`, `level` or `text`.
    fn format(&self, entry: &Entry) -> Result<String>;
}

/// Tab-separated `timestamp`, `level`, `text` lines.
///
/// # Example
///
/// ```
/// use sinkchain::{Entry, EntryFormatter, Level, LogEntry, PlainFormatter, TextEntry};
///
/// let entry: Entry = TextEntry::new().with_level(Level::WARNING).with_text("low disk").into();
/// let line = PlainFormatter.format(&entry).unwrap();
/// assert!(line.ends_with("\tWARNING\tlow disk\n"));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlainFormatter;

/// Width the level column is padded to.
pub const LEVEL_WIDTH: usize = 7;

impl EntryFormatter for PlainFormatter {
    fn format(&self, entry: &Entry) -> Result<String> {
        let map = entry.serialized().map_err(|e| match e {
            LogError::InvalidState(msg) => LogError::InvalidData(msg),
            other => other,
        })?;
        format_serialized(&map)
    }
}

/// Render an already serialized entry map.
pub fn format_serialized(map: &Value) -> Result<String> {
    let field = |key: &str| {
        map.get(key)
            .ok_or_else(|| LogError::InvalidData(format!("missing key `{}`", key)))
    };
    let timestamp = field("timestamp")?
        .as_str()
        .ok_or_else(|| LogError::InvalidData("`timestamp` is not a string".to_string()))?;
    let level = field("level")?
        .as_i64()
        .map(Level::from_int)
        .ok_or_else(|| LogError::InvalidData("`level` is not an integer".to_string()))?;
    let text = field("text")?
        .as_str()
        .ok_or_else(|| LogError::InvalidData("`text` is not a string".to_string()))?;

    Ok(format!(
        "{}\t{:>width$}\t{}\n",
        timestamp,
        level,
        text,
        width = LEVEL_WIDTH
    ))
}
