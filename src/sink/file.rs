//! File-backed sink.
//!
//! A [`FileSink`] writes one formatted line per qualifying entry. The open
//! handle lives outside the serializable state: a sink moves from
//! `Unopened` to `Open` through [`FileSink::opened`] (or implicitly on the
//! first entry at or above its threshold) and back through
//! [`FileSink::closed`]. A deserialized file sink always starts unopened.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::registry::{self, State};
use super::{LogSink, Sink};
use crate::entry::{Entry, LogEntry};
use crate::error::{LogError, Result};
use crate::format::{EntryFormatter, PlainFormatter};
use crate::level::Level;

/// Pathnames starting with this prefix name a process stream
/// (`stream://stdout`, `stream://stderr`) instead of a file.
pub const STREAM_PREFIX: &str = "stream://";

/// How a file is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Append, creating the file if needed.
    #[default]
    AppendCreate,
    /// Truncate on open, creating the file if needed.
    TruncateCreate,
    /// Append to a file that must already exist.
    AppendExisting,
}

impl FileMode {
    /// The token stored in serialized state.
    pub fn token(self) -> &'static str {
        match self {
            FileMode::AppendCreate => "append-create",
            FileMode::TruncateCreate => "truncate-create",
            FileMode::AppendExisting => "append-existing",
        }
    }

    fn options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            FileMode::AppendCreate => options.append(true).create(true),
            FileMode::TruncateCreate => options.write(true).create(true).truncate(true),
            FileMode::AppendExisting => options.append(true),
        };
        options
    }
}

impl FromStr for FileMode {
    type Err = LogError;

    /// Accepts the wire tokens and the fopen-style `ab`, `a`, `wb`, `w`.
    fn from_str(token: &str) -> Result<Self> {
        match token {
            "append-create" | "ab" | "a" => Ok(FileMode::AppendCreate),
            "truncate-create" | "wb" | "w" => Ok(FileMode::TruncateCreate),
            "append-existing" => Ok(FileMode::AppendExisting),
            other => Err(LogError::MalformedData(format!(
                "unknown file mode `{}`",
                other
            ))),
        }
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Where a file sink writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTarget {
    /// File path or `stream://` name; unset until `with_file`.
    pub pathname: Option<String>,
    /// Open mode.
    pub mode: FileMode,
}

#[derive(Debug)]
enum Output {
    File(File),
    Stdout,
    Stderr,
}

/// An open destination. Released when the last sink value holding it drops.
#[derive(Debug)]
struct FileHandle {
    output: Output,
}

impl FileHandle {
    fn open(pathname: &str, mode: FileMode) -> Result<Self> {
        if let Some(stream) = pathname.strip_prefix(STREAM_PREFIX) {
            let output = match stream {
                "stdout" => Output::Stdout,
                "stderr" => Output::Stderr,
                other => {
                    return Err(LogError::io(
                        format!("couldn't open stream `{}`", pathname),
                        io::Error::new(
                            io::ErrorKind::NotFound,
                            format!("unknown stream `{}`", other),
                        ),
                    ))
                }
            };
            return Ok(FileHandle { output });
        }

        let path = Path::new(pathname);
        if let Some(folder) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !folder.is_dir() {
                fs::create_dir_all(folder).map_err(|e| {
                    LogError::io(format!("couldn't create folder `{}`", folder.display()), e)
                })?;
            }
        }
        let file = mode.options().open(path).map_err(|e| {
            LogError::io(
                format!("couldn't open file `{}` with mode `{}`", pathname, mode),
                e,
            )
        })?;
        Ok(FileHandle {
            output: Output::File(file),
        })
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        match &self.output {
            Output::File(file) => {
                let mut file: &File = file;
                file.write_all(line.as_bytes())
            }
            Output::Stdout => io::stdout().lock().write_all(line.as_bytes()),
            Output::Stderr => io::stderr().lock().write_all(line.as_bytes()),
        }
    }

    fn close(&self) -> io::Result<()> {
        match &self.output {
            Output::File(file) => {
                let mut writer: &File = file;
                writer.flush()?;
                // devices, pipes and FIFOs can't be synced
                match file.sync_all() {
                    Err(e) if matches!(
                        e.kind(),
                        io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported
                    ) =>
                    {
                        Ok(())
                    }
                    other => other,
                }
            }
            Output::Stdout => io::stdout().flush(),
            Output::Stderr => io::stderr().flush(),
        }
    }
}

#[derive(Debug, Clone)]
enum FileState {
    Unopened,
    Open(Arc<FileHandle>),
}

/// What `with_entry` has to do for an entry of a given level.
enum Step {
    /// Below threshold: only the inner chain is updated.
    Forward,
    /// Qualifying entry, no handle yet: open first.
    Open,
    /// Qualifying entry, handle ready.
    Write(Arc<FileHandle>),
}

/// Writes one formatted line per qualifying entry.
///
/// The inner sink is updated before the line is written. When the write
/// fails the error is returned and the updated chain is lost with it: the
/// logical append happened, the physical one is uncertain.
///
/// Clones of an opened sink share its handle; the file is released when the
/// last of them is dropped. Call [`FileSink::closed`] to flush and detach
/// explicitly.
///
/// # Example
///
/// ```no_run
/// use sinkchain::{FileMode, FileSink, LogSink, TextEntry};
///
/// let _sink = FileSink::new()
///     .with_file("/var/log/app/app.log", FileMode::AppendCreate)?
///     .with_entry(TextEntry::new().with_text("started"))?
///     .closed()?;
/// # Ok::<(), sinkchain::LogError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileSink {
    target: FileTarget,
    min_level: Level,
    original: Arc<Sink>,
    formatter: Arc<dyn EntryFormatter>,
    state: FileState,
}

impl FileSink {
    /// Registry tag.
    pub const TYPE_TAG: &'static str = "file";

    /// An unconfigured file sink at [`Level::INFO`] wrapping a null sink.
    pub fn new() -> Self {
        FileSink {
            target: FileTarget::default(),
            min_level: Level::INFO,
            original: Arc::new(Sink::default()),
            formatter: Arc::new(PlainFormatter),
            state: FileState::Unopened,
        }
    }

    /// An unopened sink writing to `pathname` in the default mode.
    pub fn at(pathname: impl Into<String>) -> Self {
        FileSink {
            target: FileTarget {
                pathname: Some(pathname.into()),
                mode: FileMode::default(),
            },
            ..Self::new()
        }
    }

    /// Point the sink at another file.
    ///
    /// Fails with [`LogError::AlreadyOpen`] while a handle is held.
    pub fn with_file(&self, pathname: impl Into<String>, mode: FileMode) -> Result<Self> {
        if self.is_open() {
            return Err(LogError::AlreadyOpen {
                pathname: self.display_path().to_string(),
            });
        }
        Ok(FileSink {
            target: FileTarget {
                pathname: Some(pathname.into()),
                mode,
            },
            ..self.clone()
        })
    }

    /// Open the destination; returns the sink unchanged when already open.
    ///
    /// Missing parent directories are created, except for `stream://` names.
    /// Fails with [`LogError::Io`] when that or the open fails, and with
    /// [`LogError::InvalidConfiguration`] when no pathname was set.
    pub fn opened(&self) -> Result<Self> {
        if self.is_open() {
            return Ok(self.clone());
        }
        let pathname = self.target.pathname.as_deref().ok_or_else(|| {
            LogError::InvalidConfiguration("file sink has no pathname".to_string())
        })?;
        let handle = FileHandle::open(pathname, self.target.mode)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(pathname, mode = %self.target.mode, "opened log file");

        Ok(FileSink {
            state: FileState::Open(Arc::new(handle)),
            ..self.clone()
        })
    }

    /// Flush and detach the handle; returns the sink unchanged when not open.
    pub fn closed(&self) -> Result<Self> {
        let FileState::Open(handle) = &self.state else {
            return Ok(self.clone());
        };
        handle.close().map_err(|e| {
            LogError::io(format!("couldn't close file `{}`", self.display_path()), e)
        })?;

        #[cfg(feature = "tracing")]
        tracing::debug!(pathname = self.display_path(), "closed log file");

        Ok(FileSink {
            state: FileState::Unopened,
            ..self.clone()
        })
    }

    /// Replace the innermost replaceable sink with `sink`.
    ///
    /// When the wrapped sink is itself a file sink the call recurses into it,
    /// so `sink` lands below the deepest file layer; otherwise it replaces
    /// the wrapped sink directly.
    pub fn with_embedded(&self, sink: impl Into<Sink>) -> Self {
        let sink = sink.into();
        let original = match self.original.as_ref() {
            Sink::File(inner) => Sink::File(inner.with_embedded(sink)),
            _ => sink,
        };
        self.with_original_arc(Arc::new(original))
    }

    /// Returns the sink wrapping `original` instead.
    pub fn with_original(&self, original: impl Into<Sink>) -> Self {
        self.with_original_arc(Arc::new(original.into()))
    }

    pub(crate) fn with_original_arc(&self, original: Arc<Sink>) -> Self {
        FileSink {
            original,
            ..self.clone()
        }
    }

    /// Render lines with `formatter` instead of [`PlainFormatter`].
    ///
    /// The formatter is not persisted; a deserialized sink uses the default.
    pub fn with_formatter(&self, formatter: impl EntryFormatter + 'static) -> Self {
        FileSink {
            formatter: Arc::new(formatter),
            ..self.clone()
        }
    }

    /// The wrapped sink.
    pub fn original(&self) -> &Sink {
        &self.original
    }

    /// Pathname and mode.
    pub fn target(&self) -> &FileTarget {
        &self.target
    }

    /// Returns true while a handle is held.
    pub fn is_open(&self) -> bool {
        matches!(self.state, FileState::Open(_))
    }

    fn display_path(&self) -> &str {
        self.target.pathname.as_deref().unwrap_or("<unset>")
    }

    fn step(&self, level: Level) -> Step {
        if level.is_below(self.min_level) {
            return Step::Forward;
        }
        match &self.state {
            FileState::Unopened => Step::Open,
            FileState::Open(handle) => Step::Write(Arc::clone(handle)),
        }
    }

    pub(crate) fn from_state(state: &State) -> Result<Self> {
        let min_level = registry::read_min_level(state)?;
        let pathname = registry::read_optional_str(state, "pathname")?.map(str::to_string);
        let mode = registry::read_optional_str(state, "mode")?
            .map(FileMode::from_str)
            .transpose()?
            .unwrap_or_default();
        let original = registry::read_original(state)?;
        Ok(FileSink {
            target: FileTarget { pathname, mode },
            min_level,
            original: Arc::new(original),
            ..Self::new()
        })
    }
}

impl Default for FileSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for FileSink {
    fn with_entry(&self, entry: impl Into<Entry>) -> Result<Self> {
        let entry = entry.into();
        match self.step(entry.level()) {
            Step::Forward => {
                let original = self.original.with_entry(entry)?;
                Ok(self.with_original_arc(Arc::new(original)))
            }
            Step::Open => self.opened()?.with_entry(entry),
            Step::Write(handle) => {
                let original = self.original.with_entry(entry.clone())?;
                let line = self.formatter.format(&entry)?;
                if let Err(e) = handle.write_line(&line) {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(pathname = self.display_path(), error = %e, "log write failed");
                    return Err(LogError::io(
                        format!("couldn't write into file `{}`", self.display_path()),
                        e,
                    ));
                }
                Ok(self.with_original_arc(Arc::new(original)))
            }
        }
    }

    fn with_min_level(&self, level: Level) -> Self {
        FileSink {
            min_level: level,
            ..self.clone()
        }
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    /// Same configuration and inner sink, no handle.
    fn created(&self) -> Self {
        FileSink {
            state: FileState::Unopened,
            ..self.clone()
        }
    }

    fn serialized(&self) -> Result<Value> {
        let mut state = Map::new();
        if let Some(pathname) = &self.target.pathname {
            state.insert("pathname".to_string(), Value::String(pathname.clone()));
        }
        state.insert(
            "mode".to_string(),
            Value::String(self.target.mode.token().to_string()),
        );
        state.insert("minLevel".to_string(), Value::from(self.min_level.to_int()));
        state.insert("original".to_string(), self.original.serialized()?);
        Ok(registry::tagged(Self::TYPE_TAG, state))
    }

    fn deserialized(data: &Value) -> Result<Self> {
        registry::expect_tag(data, Self::TYPE_TAG).and_then(Self::from_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::TextEntry;
    use crate::sink::MemorySink;
    use serde_json::json;

    fn text(level: Level, s: &str) -> TextEntry {
        TextEntry::new().with_level(level).with_text(s)
    }

    #[test]
    fn test_mode_tokens() {
        assert_eq!("ab".parse::<FileMode>().unwrap(), FileMode::AppendCreate);
        assert_eq!("w".parse::<FileMode>().unwrap(), FileMode::TruncateCreate);
        assert_eq!(
            FileMode::AppendExisting.token().parse::<FileMode>().unwrap(),
            FileMode::AppendExisting
        );
        assert!("rw+".parse::<FileMode>().unwrap_err().is_malformed());
    }

    #[test]
    fn test_writes_lines_and_creates_folders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/app.log");
        let sink = FileSink::at(path.to_string_lossy())
            .with_entry(text(Level::INFO, "one"))
            .unwrap()
            .with_entry(text(Level::ERROR, "two"))
            .unwrap()
            .closed()
            .unwrap();
        assert!(!sink.is_open());

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("\t   INFO\tone"));
        assert!(lines[1].ends_with("\t  ERROR\ttwo"));
    }

    #[test]
    fn test_below_threshold_never_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiet/app.log");
        let sink = FileSink::at(path.to_string_lossy())
            .with_min_level(Level::ERROR)
            .with_original(MemorySink::new().with_min_level(Level::DEBUG))
            .with_entry(text(Level::WARNING, "skip"))
            .unwrap();
        assert!(!sink.is_open());
        assert!(!path.exists());
        assert!(!dir.path().join("quiet").exists());
        assert_eq!(sink.original().as_memory().unwrap().len(), 1);
    }

    #[test]
    fn test_with_file_on_open_sink_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::at(dir.path().join("a.log").to_string_lossy())
            .opened()
            .unwrap();
        let err = sink.with_file("b.log", FileMode::default()).unwrap_err();
        assert!(matches!(err, LogError::AlreadyOpen { .. }));

        let reopened = sink.closed().unwrap().with_file(
            dir.path().join("b.log").to_string_lossy(),
            FileMode::TruncateCreate,
        );
        assert!(reopened.is_ok());
    }

    #[test]
    fn test_opened_and_closed_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::at(dir.path().join("a.log").to_string_lossy());
        assert!(!sink.closed().unwrap().is_open());
        let open = sink.opened().unwrap().opened().unwrap();
        assert!(open.is_open());
        let closed = open.closed().unwrap().closed().unwrap();
        assert!(!closed.is_open());
    }

    #[test]
    fn test_opened_without_pathname() {
        let err = FileSink::new().opened().unwrap_err();
        assert!(matches!(err, LogError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_folder_creation_failure_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("plain-file");
        fs::write(&blocker, "x").unwrap();
        let err = FileSink::at(blocker.join("sub/app.log").to_string_lossy())
            .opened()
            .unwrap_err();
        assert!(err.is_io());
        assert!(err.to_string().contains("couldn't create folder"));
    }

    #[test]
    fn test_open_failure_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSink::new()
            .with_file(
                dir.path().join("missing.log").to_string_lossy(),
                FileMode::AppendExisting,
            )
            .unwrap()
            .opened()
            .unwrap_err();
        assert!(err.is_io());
        assert!(err.to_string().contains("append-existing"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_write_failure_is_io() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let sink = FileSink::new()
            .with_file("/dev/full", FileMode::AppendExisting)
            .unwrap();
        let err = sink.with_entry(text(Level::ERROR, "x")).unwrap_err();
        assert!(err.is_io());
        assert!(err.to_string().contains("couldn't write into file `/dev/full`"));
    }

    #[cfg(unix)]
    #[test]
    fn test_character_device_closes() {
        let sink = FileSink::at("/dev/null")
            .with_entry(text(Level::INFO, "x"))
            .unwrap();
        assert!(sink.is_open());
        let closed = sink.closed().unwrap();
        assert!(!closed.is_open());

        let inner = FileSink::at("/dev/null").with_min_level(Level::DEBUG);
        let chain: Sink = MemorySink::wrapping(inner).into();
        let chain = chain.with_entry(text(Level::INFO, "y")).unwrap();
        let closed = chain.closed().unwrap();
        assert!(!closed.original().unwrap().as_file().unwrap().is_open());
    }

    #[test]
    fn test_stream_target_skips_folder_creation() {
        let sink = FileSink::at("stream://stderr").opened().unwrap();
        assert!(sink.is_open());
        let err = FileSink::at("stream://printer").opened().unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_serialized_omits_handle() {
        let dir = tempfile::tempdir().unwrap();
        let pathname = dir.path().join("a.log").to_string_lossy().to_string();
        let sink = FileSink::at(pathname.clone())
            .with_min_level(Level::WARNING)
            .opened()
            .unwrap();
        assert_eq!(
            sink.serialized().unwrap(),
            json!({"typeTag": "file", "state": {
                "pathname": pathname,
                "mode": "append-create",
                "minLevel": 3,
                "original": {"typeTag": "null", "state": {}}
            }})
        );
    }

    #[test]
    fn test_deserialized_starts_unopened() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::at(dir.path().join("a.log").to_string_lossy())
            .opened()
            .unwrap();
        let back = FileSink::deserialized(&sink.serialized().unwrap()).unwrap();
        assert!(!back.is_open());
        assert_eq!(back.target(), sink.target());
    }

    #[test]
    fn test_deserialized_defaults_and_legacy_mode() {
        let data = json!({"typeTag": "file", "state": {"minLevel": 0, "mode": "ab"}});
        let sink = FileSink::deserialized(&data).unwrap();
        assert_eq!(sink.target().mode, FileMode::AppendCreate);
        assert!(sink.target().pathname.is_none());
        assert!(matches!(sink.original(), Sink::Null(_)));

        let bad = json!({"typeTag": "file", "state": {"minLevel": 0, "pathname": 7}});
        assert!(FileSink::deserialized(&bad).unwrap_err().is_malformed());
    }

    #[test]
    fn test_with_embedded_replaces_non_file_original() {
        let sink = FileSink::new()
            .with_original(MemorySink::new())
            .with_embedded(MemorySink::new().with_min_level(Level::CRITICAL));
        assert_eq!(sink.original().min_level(), Level::CRITICAL);
    }

    #[test]
    fn test_with_embedded_recurses_into_file_layers() {
        let inner = FileSink::at("inner.log").with_original(MemorySink::new());
        let outer = FileSink::at("outer.log").with_original(inner);
        let embedded = outer.with_embedded(MemorySink::new().with_min_level(Level::ERROR));

        let inner = embedded.original().as_file().unwrap();
        assert_eq!(inner.target().pathname.as_deref(), Some("inner.log"));
        assert_eq!(inner.original().min_level(), Level::ERROR);
        assert_eq!(embedded.target().pathname.as_deref(), Some("outer.log"));
    }

    #[test]
    fn test_created_drops_handle_keeps_config() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::at(dir.path().join("a.log").to_string_lossy())
            .with_min_level(Level::ERROR)
            .opened()
            .unwrap();
        let fresh = sink.created();
        assert!(!fresh.is_open());
        assert_eq!(fresh.min_level(), Level::ERROR);
        assert_eq!(fresh.target(), sink.target());
    }

    #[cfg(feature = "tracing")]
    #[test]
    #[tracing_test::traced_test]
    fn test_open_and_close_are_traced() {
        let dir = tempfile::tempdir().unwrap();
        FileSink::at(dir.path().join("traced.log").to_string_lossy())
            .opened()
            .unwrap()
            .closed()
            .unwrap();
        assert!(logs_contain("opened log file"));
        assert!(logs_contain("closed log file"));
    }

    #[derive(Debug)]
    struct Bare;

    impl EntryFormatter for Bare {
        fn format(&self, entry: &Entry) -> Result<String> {
            Ok(format!("{}\n", entry.payload().unwrap_or_default()))
        }
    }

    #[test]
    fn test_custom_formatter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.log");
        FileSink::at(path.to_string_lossy())
            .with_formatter(Bare)
            .with_entry(text(Level::INFO, "just this"))
            .unwrap()
            .closed()
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "just this\n");
    }
}
