//! Structured-value entries.

use serde::Serialize;

use super::{impl_log_entry, Record};
use crate::encode::encode;
use crate::error::Result;
use crate::level::Level;

/// An entry whose payload is an encoded structured value.
///
/// The value goes through [`encode`](crate::encode::encode) once, when it is
/// attached; the entry keeps only the resulting string.
///
/// # Example
///
/// ```
/// use sinkchain::{LogEntry, StructuredEntry};
/// use sinkchain::encode::decode;
/// use serde_json::json;
///
/// let entry = StructuredEntry::new()
///     .with_data(&json!({"user": 7, "action": "login"}))
///     .unwrap();
/// let payload = entry.serialized().unwrap()["text"].as_str().unwrap().to_string();
/// assert_eq!(decode(&payload).unwrap()["action"], "login");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredEntry {
    pub(crate) record: Record,
}

impl StructuredEntry {
    /// A fresh, unfinalized structured entry at [`Level::INFO`].
    pub fn new() -> Self {
        StructuredEntry {
            record: Record::new(Level::INFO),
        }
    }

    /// Encode `value` into the payload and stamp the entry with the current time.
    ///
    /// Fails with [`LogError::Encode`](crate::LogError::Encode) when the value
    /// has no JSON form or compression fails.
    pub fn with_data<T: Serialize + ?Sized>(&self, value: &T) -> Result<Self> {
        let payload = encode(value)?;
        Ok(StructuredEntry {
            record: self.record.stamped(payload),
        })
    }

    /// The encoded payload, if set.
    pub fn payload(&self) -> Option<&str> {
        self.record.payload()
    }
}

impl Default for StructuredEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl_log_entry!(StructuredEntry);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::decode;
    use crate::entry::LogEntry;
    use crate::error::LogError;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Login<'a> {
        user: &'a str,
        attempts: u32,
    }

    #[test]
    fn test_payload_decodes_to_value() {
        let entry = StructuredEntry::new()
            .with_data(&Login {
                user: "root",
                attempts: 3,
            })
            .unwrap();
        let value = decode(entry.payload().unwrap()).unwrap();
        assert_eq!(value, json!({"user": "root", "attempts": 3}));
    }

    #[test]
    fn test_default_level_is_info() {
        assert_eq!(StructuredEntry::new().level(), Level::INFO);
    }

    #[test]
    fn test_encode_failure_leaves_entry_unfinalized() {
        let base = StructuredEntry::new();
        let mut bad = HashMap::new();
        bad.insert(vec![1u8], 1);
        let err = base.with_data(&bad).unwrap_err();
        assert!(matches!(err, LogError::Encode(_)));
        assert!(!base.is_finalized());
    }

    #[test]
    fn test_nan_is_rejected_not_stored_as_null() {
        let err = StructuredEntry::new().with_data(&f64::NAN).unwrap_err();
        assert!(matches!(err, LogError::Encode(_)));
    }

    #[test]
    fn test_serialized_carries_payload_verbatim() {
        let entry = StructuredEntry::new()
            .with_level(Level::NOTICE)
            .with_data(&[1, 2, 3])
            .unwrap();
        let map = entry.serialized().unwrap();
        assert_eq!(map["text"], entry.payload().unwrap());
        assert_eq!(map["level"], 2);
    }
}
