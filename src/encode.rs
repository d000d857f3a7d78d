//! Payload encode pipeline
//!
//! Structured and exception entries store their payload as one opaque ASCII
//! string. [`encode`] produces it in three steps:
//!
//! 1. serialize the value to pretty-printed JSON (UTF-8 kept as is, forward
//!    slashes left unescaped)
//! 2. gzip the JSON bytes when the `gzip` feature is enabled, skipped otherwise
//! 3. base64-encode the result
//!
//! Entries never decode their own payload. [`decode`] is provided for log
//! consumers that need the structured value back.
//!
//! # Examples
//!
//! ```
//! use sinkchain::encode::{decode, encode};
//! use serde_json::json;
//!
//! let payload = encode(&json!({"user": "ünïcode", "path": "/var/log"})).unwrap();
//! assert!(payload.is_ascii());
//! assert_eq!(decode(&payload).unwrap()["path"], "/var/log");
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::ser::{self, Serialize};

/// Failures of the encode pipeline and of its inverse.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The value has no JSON representation, or the decoded bytes are not JSON.
    #[error("json: {0}")]
    Json(#[source] serde_json::Error),

    /// Compression or decompression failed.
    #[error("gzip: {0}")]
    Compress(#[source] std::io::Error),

    /// The payload is not valid base64.
    #[error("base64: {0}")]
    Base64(#[source] base64::DecodeError),
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Encode `value` into an opaque ASCII payload.
///
/// The output is deterministic for a given value and feature set.
///
/// Fails with [`EncodeError::Json`] when the value holds a NaN or infinite
/// float, which JSON has no literal for.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, EncodeError> {
    value
        .serialize(&mut FiniteFloats)
        .map_err(EncodeError::Json)?;
    let json = serde_json::to_vec_pretty(value).map_err(EncodeError::Json)?;
    let packed = compress(json)?;
    Ok(STANDARD.encode(packed))
}

/// Recover the JSON value from a payload produced by [`encode`].
///
/// Payloads written with or without compression are both accepted; the gzip
/// magic bytes decide.
pub fn decode(payload: &str) -> Result<serde_json::Value, EncodeError> {
    let bytes = STANDARD.decode(payload).map_err(EncodeError::Base64)?;
    let json = if bytes.starts_with(&GZIP_MAGIC) {
        decompress(&bytes)?
    } else {
        bytes
    };
    serde_json::from_slice(&json).map_err(EncodeError::Json)
}

/// Walks a value and rejects non-finite floats, which `serde_json` would
/// otherwise write as `null`.
struct FiniteFloats;

type Checked = Result<(), serde_json::Error>;

macro_rules! accept {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(fn $method(self, _: $ty) -> Checked {
            Ok(())
        })*
    };
}

fn finite(value: f64) -> Checked {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ser::Error::custom(format!(
            "{} has no JSON representation",
            value
        )))
    }
}

impl<'a> ser::Serializer for &'a mut FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    accept! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_u128: u128,
        serialize_char: char,
        serialize_str: &str,
        serialize_bytes: &[u8],
        serialize_unit_struct: &'static str,
    }

    fn serialize_f32(self, v: f32) -> Checked {
        finite(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Checked {
        finite(v)
    }

    fn serialize_none(self) -> Checked {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Checked {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Checked {
        Ok(())
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Checked {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple(self, _: usize) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, serde_json::Error> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, serde_json::Error> {
        Ok(self)
    }
}

impl ser::SerializeSeq for &mut FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTuple for &mut FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for &mut FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for &mut FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeMap for &mut FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Checked {
        key.serialize(&mut **self)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Checked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStruct for &mut FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Checked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl ser::SerializeStructVariant for &mut FiniteFloats {
    type Ok = ();
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Checked {
        value.serialize(&mut **self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

#[cfg(feature = "gzip")]
fn compress(bytes: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
    encoder.write_all(&bytes).map_err(EncodeError::Compress)?;
    encoder.finish().map_err(EncodeError::Compress)
}

#[cfg(not(feature = "gzip"))]
fn compress(bytes: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
    Ok(bytes)
}

#[cfg(feature = "gzip")]
fn decompress(bytes: &[u8]) -> Result<Vec<u8>, EncodeError> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(EncodeError::Compress)?;
    Ok(out)
}

#[cfg(not(feature = "gzip"))]
fn decompress(_bytes: &[u8]) -> Result<Vec<u8>, EncodeError> {
    Err(EncodeError::Compress(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "payload is gzip-compressed but the `gzip` feature is disabled",
    )))
}
