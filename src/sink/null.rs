//! The sink that keeps nothing.

use serde_json::Value;

use super::registry::{self, State};
use super::LogSink;
use crate::entry::Entry;
use crate::error::Result;
use crate::level::Level;

/// Absorbs every entry and stores nothing.
///
/// All updates return the sink unchanged, including
/// [`with_min_level`](LogSink::with_min_level): a sink that keeps nothing has
/// no meaningful threshold. It terminates every chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullSink;

impl NullSink {
    /// Registry tag.
    pub const TYPE_TAG: &'static str = "null";

    /// Any state map restores the same sink.
    pub(crate) fn from_state(_state: &State) -> Result<Self> {
        Ok(NullSink)
    }
}

impl LogSink for NullSink {
    fn with_entry(&self, _entry: impl Into<Entry>) -> Result<Self> {
        Ok(*self)
    }

    fn with_min_level(&self, _level: Level) -> Self {
        *self
    }

    fn min_level(&self) -> Level {
        Level::DEBUG
    }

    fn created(&self) -> Self {
        *self
    }

    fn serialized(&self) -> Result<Value> {
        Ok(registry::tagged(Self::TYPE_TAG, State::new()))
    }

    fn deserialized(data: &Value) -> Result<Self> {
        registry::expect_tag(data, Self::TYPE_TAG).and_then(Self::from_state)
    }
}
