//! Tagged-map persistence shared by all sink kinds.
//!
//! A serialized sink is `{"typeTag": <tag>, "state": {...}}`. Wrapping kinds
//! embed their inner sink's own tagged map under `state.original`.
//! Reconstruction looks the tag up in a closed table of constructors; an
//! unknown tag is an error, never a guess.

use serde_json::{Map, Value};

use super::bounded::BoundedMemorySink;
use super::file::FileSink;
use super::memory::MemorySink;
use super::null::NullSink;
use super::Sink;
use crate::entry::Entry;
use crate::error::{LogError, Result};
use crate::level::Level;

/// Key holding the kind identifier.
pub const TYPE_TAG_KEY: &str = "typeTag";
/// Key holding the kind-specific state.
pub const STATE_KEY: &str = "state";

pub(crate) type State = Map<String, Value>;

struct Registration {
    tag: &'static str,
    build: fn(&State) -> Result<Sink>,
}

const REGISTRY: &[Registration] = &[
    Registration {
        tag: NullSink::TYPE_TAG,
        build: build_null,
    },
    Registration {
        tag: MemorySink::TYPE_TAG,
        build: build_memory,
    },
    Registration {
        tag: BoundedMemorySink::TYPE_TAG,
        build: build_bounded,
    },
    Registration {
        tag: FileSink::TYPE_TAG,
        build: build_file,
    },
];

fn build_null(state: &State) -> Result<Sink> {
    NullSink::from_state(state).map(Sink::Null)
}

fn build_memory(state: &State) -> Result<Sink> {
    MemorySink::from_state(state).map(Sink::Memory)
}

fn build_bounded(state: &State) -> Result<Sink> {
    BoundedMemorySink::from_state(state).map(Sink::Bounded)
}

fn build_file(state: &State) -> Result<Sink> {
    FileSink::from_state(state).map(Sink::File)
}

/// Every tag the registry resolves.
pub fn known_tags() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|r| r.tag)
}

/// Rebuild any registered sink kind from its tagged map.
pub(crate) fn deserialize_any(data: &Value) -> Result<Sink> {
    let (tag, state) = split(data)?;
    let registration = REGISTRY
        .iter()
        .find(|r| r.tag == tag)
        .ok_or_else(|| LogError::unresolved(tag, "no sink kind is registered under this tag"))?;

    #[cfg(feature = "tracing")]
    tracing::debug!(tag, "resolved sink type");

    (registration.build)(state)
}

/// Split a tagged map and require `expected` as its tag.
///
/// Registered tags naming another kind fail the same way unknown tags do:
/// the resolved kind cannot stand where `expected` is required.
pub(crate) fn expect_tag<'a>(data: &'a Value, expected: &str) -> Result<&'a State> {
    let (tag, state) = split(data)?;
    if tag == expected {
        return Ok(state);
    }
    let reason = if known_tags().any(|known| known == tag) {
        format!("a `{}` sink is required here", expected)
    } else {
        "no sink kind is registered under this tag".to_string()
    };
    Err(LogError::unresolved(tag, reason))
}

pub(crate) fn split(data: &Value) -> Result<(&str, &State)> {
    let map = data
        .as_object()
        .ok_or_else(|| LogError::MalformedData("tagged sink is not a map".to_string()))?;
    let tag = map
        .get(TYPE_TAG_KEY)
        .ok_or_else(|| LogError::MalformedData(format!("missing key `{}`", TYPE_TAG_KEY)))?
        .as_str()
        .ok_or_else(|| LogError::MalformedData(format!("`{}` is not a string", TYPE_TAG_KEY)))?;
    let state = map
        .get(STATE_KEY)
        .ok_or_else(|| LogError::MalformedData(format!("missing key `{}` for `{}`", STATE_KEY, tag)))?
        .as_object()
        .ok_or_else(|| LogError::MalformedData(format!("`{}` of `{}` is not a map", STATE_KEY, tag)))?;
    Ok((tag, state))
}

pub(crate) fn tagged(tag: &str, state: State) -> Value {
    let mut map = Map::with_capacity(2);
    map.insert(TYPE_TAG_KEY.to_string(), Value::String(tag.to_string()));
    map.insert(STATE_KEY.to_string(), Value::Object(state));
    Value::Object(map)
}

/// The wrapped sink, or a null sink when `original` is absent.
pub(crate) fn read_original(state: &State) -> Result<Sink> {
    match state.get("original") {
        None | Some(Value::Null) => Ok(Sink::Null(NullSink)),
        Some(original) => deserialize_any(original),
    }
}

pub(crate) fn read_min_level(state: &State) -> Result<Level> {
    read_int(state, "minLevel").map(Level::from_int)
}

pub(crate) fn read_int(state: &State, key: &str) -> Result<i64> {
    state
        .get(key)
        .ok_or_else(|| LogError::MalformedData(format!("missing key `{}`", key)))?
        .as_i64()
        .ok_or_else(|| LogError::MalformedData(format!("`{}` is not an integer", key)))
}

pub(crate) fn read_optional_str<'a>(state: &'a State, key: &str) -> Result<Option<&'a str>> {
    match state.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(LogError::MalformedData(format!("`{}` is not a string", key))),
    }
}

pub(crate) fn read_entries(state: &State) -> Result<Vec<Entry>> {
    state
        .get("ar")
        .ok_or_else(|| LogError::MalformedData("missing key `ar`".to_string()))?
        .as_array()
        .ok_or_else(|| LogError::MalformedData("`ar` is not a list".to_string()))?
        .iter()
        .map(Entry::deserialized)
        .collect()
}
