//! Plain text entries.

use serde_json::Value;

use super::{impl_log_entry, Record};
use crate::error::Result;
use crate::level::Level;

/// An entry whose payload is a single line of text.
///
/// # Example
///
/// ```
/// use sinkchain::{LogEntry, TextEntry};
///
/// let entry = TextEntry::new().with_text("first\nsecond");
/// assert_eq!(entry.serialized().unwrap()["text"], "first\\nsecond");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TextEntry {
    pub(crate) record: Record,
}

impl TextEntry {
    /// A fresh, unfinalized text entry at [`Level::INFO`].
    pub fn new() -> Self {
        TextEntry {
            record: Record::new(Level::INFO),
        }
    }

    /// Set the text and stamp the entry with the current time.
    ///
    /// Literal CR and LF characters are stored as the two-character
    /// sequences `\r` and `\n` so the payload stays on one line.
    pub fn with_text(&self, raw: impl AsRef<str>) -> Self {
        TextEntry {
            record: self.record.stamped(escape_line_breaks(raw.as_ref())),
        }
    }

    /// The stored text, if set.
    pub fn text(&self) -> Option<&str> {
        self.record.payload()
    }

    /// Rebuild a finalized text entry from `{level, timestamp, text}`.
    pub fn deserialized(data: &Value) -> Result<Self> {
        Ok(TextEntry {
            record: Record::deserialized(data)?,
        })
    }
}

impl Default for TextEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl_log_entry!(TextEntry);

fn escape_line_breaks(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}
