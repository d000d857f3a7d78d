//! Captured-error entries.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::panic::Location;

use serde::{Deserialize, Serialize};

use super::{impl_log_entry, Record};
use crate::encode::encode;
use crate::error::Result;
use crate::level::Level;

/// One error of a captured chain, with its cause nested inside.
///
/// Serialized field names are `type`, `code`, `message`, `originLocation`,
/// `stackTrace` and `cause`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// Type name of the error, best effort for causes.
    #[serde(rename = "type")]
    pub kind: String,
    /// OS error code for I/O errors, `0` otherwise.
    pub code: i64,
    /// The error's `Display` text.
    pub message: String,
    /// `file:line` where the error was captured.
    pub origin_location: Option<String>,
    /// Backtrace frames, empty unless backtraces are enabled.
    pub stack_trace: Vec<String>,
    /// The error's source, recursively.
    pub cause: Option<Box<ErrorRecord>>,
}

impl ErrorRecord {
    /// Capture `err` and its whole `source()` chain.
    ///
    /// The capture site becomes the record's origin location. A backtrace is
    /// recorded when `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE` enable one.
    #[track_caller]
    pub fn capture<E: Error + 'static>(err: &E) -> Self {
        let location = Location::caller();
        let mut record = Self::walk(err, std::any::type_name::<E>().to_string());
        record.origin_location = Some(format!("{}:{}", location.file(), location.line()));
        let trace = Backtrace::capture();
        if trace.status() == BacktraceStatus::Captured {
            record.stack_trace = trace
                .to_string()
                .lines()
                .map(|line| line.trim().to_string())
                .collect();
        }
        record
    }

    /// Number of errors in the chain, this one included.
    pub fn depth(&self) -> usize {
        1 + self.cause.as_ref().map_or(0, |c| c.depth())
    }

    fn walk(err: &(dyn Error + 'static), kind: String) -> Self {
        ErrorRecord {
            kind,
            code: os_code(err),
            message: err.to_string(),
            origin_location: None,
            stack_trace: Vec::new(),
            cause: err
                .source()
                .map(|cause| Box::new(Self::walk(cause, cause_kind(cause)))),
        }
    }
}

fn os_code(err: &(dyn Error + 'static)) -> i64 {
    err.downcast_ref::<std::io::Error>()
        .and_then(std::io::Error::raw_os_error)
        .map_or(0, i64::from)
}

// A `dyn Error` carries no type name; the leading identifier of its Debug
// output is the closest stand-in.
fn cause_kind(err: &(dyn Error + 'static)) -> String {
    if err.is::<std::io::Error>() {
        return "std::io::Error".to_string();
    }
    let debug = format!("{:?}", err);
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if name.is_empty() {
        "unknown".to_string()
    } else {
        name
    }
}

/// An entry whose payload is an encoded [`ErrorRecord`] chain.
///
/// Defaults to [`Level::DEBUG`]: captured errors are opt-in detail.
///
/// # Example
///
/// ```
/// use sinkchain::{ExceptionEntry, Level, LogEntry};
///
/// let err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
/// let entry = ExceptionEntry::new().with_exception(&err).unwrap();
/// assert_eq!(entry.level(), Level::DEBUG);
/// assert!(entry.is_finalized());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionEntry {
    pub(crate) record: Record,
}

impl ExceptionEntry {
    /// A fresh, unfinalized exception entry at [`Level::DEBUG`].
    pub fn new() -> Self {
        ExceptionEntry {
            record: Record::new(Level::DEBUG),
        }
    }

    /// Capture `err` with its cause chain, encode it and stamp the entry.
    #[track_caller]
    pub fn with_exception<E: Error + 'static>(&self, err: &E) -> Result<Self> {
        let record = ErrorRecord::capture(err);
        self.with_record(&record)
    }

    /// Encode an already captured record and stamp the entry.
    pub fn with_record(&self, record: &ErrorRecord) -> Result<Self> {
        let payload = encode(record)?;
        Ok(ExceptionEntry {
            record: self.record.stamped(payload),
        })
    }

    /// The encoded payload, if set.
    pub fn payload(&self) -> Option<&str> {
        self.record.payload()
    }
}

impl Default for ExceptionEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl_log_entry!(ExceptionEntry);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::decode;
    use crate::entry::LogEntry;
    use std::fmt;

    #[derive(Debug)]
    struct ConfigError {
        source: std::io::Error,
    }

    impl fmt::Display for ConfigError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "couldn't load config")
        }
    }

    impl Error for ConfigError {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.source)
        }
    }

    fn sample() -> ConfigError {
        ConfigError {
            source: std::io::Error::from_raw_os_error(2),
        }
    }

    #[test]
    fn test_capture_walks_cause_chain() {
        let record = ErrorRecord::capture(&sample());
        assert_eq!(record.depth(), 2);
        assert!(record.kind.ends_with("ConfigError"));
        assert_eq!(record.message, "couldn't load config");
        assert_eq!(record.code, 0);
        assert!(record.origin_location.as_deref().unwrap().contains("exception.rs"));

        let cause = record.cause.as_deref().unwrap();
        assert_eq!(cause.kind, "std::io::Error");
        assert_eq!(cause.code, 2);
        assert!(cause.cause.is_none());
    }

    #[test]
    fn test_record_field_names() {
        let value = serde_json::to_value(ErrorRecord::capture(&sample())).unwrap();
        for key in ["type", "code", "message", "originLocation", "stackTrace", "cause"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert!(value["cause"]["cause"].is_null());
    }

    #[test]
    fn test_default_level_is_debug() {
        assert_eq!(ExceptionEntry::new().level(), Level::DEBUG);
    }

    #[test]
    fn test_payload_decodes_to_record() {
        let entry = ExceptionEntry::new()
            .with_level(Level::ERROR)
            .with_exception(&sample())
            .unwrap();
        let decoded: ErrorRecord =
            serde_json::from_value(decode(entry.payload().unwrap()).unwrap()).unwrap();
        assert_eq!(decoded.message, "couldn't load config");
        assert_eq!(decoded.depth(), 2);
        assert_eq!(entry.level(), Level::ERROR);
    }

    #[test]
    fn test_with_record_uses_given_record() {
        let record = ErrorRecord {
            kind: "remote::Timeout".to_string(),
            code: 504,
            message: "upstream timed out".to_string(),
            origin_location: None,
            stack_trace: vec![],
            cause: None,
        };
        let entry = ExceptionEntry::new().with_record(&record).unwrap();
        let decoded: ErrorRecord =
            serde_json::from_value(decode(entry.payload().unwrap()).unwrap()).unwrap();
        assert_eq!(decoded, record);
    }
}
