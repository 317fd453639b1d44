//! Cache payload encoding.
//!
//! Payloads are MessagePack with named fields, falling back to JSON text when a value
//! cannot be expressed in MessagePack. The first byte of every payload names the format,
//! so decoding never has to guess.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use crate::domain::errors::{CodecError, PayloadFormat};

const TAG_MSGPACK: u8 = 0x01;
const TAG_JSON: u8 = 0x02;

const fn tag(format: PayloadFormat) -> u8 {
    match format {
        PayloadFormat::MessagePack => TAG_MSGPACK,
        PayloadFormat::Json => TAG_JSON,
    }
}

const fn format_for_tag(tag: u8) -> Result<PayloadFormat, CodecError> {
    match tag {
        TAG_MSGPACK => Ok(PayloadFormat::MessagePack),
        TAG_JSON => Ok(PayloadFormat::Json),
        other => Err(CodecError::UnknownFormat(other)),
    }
}

/// Result of [`serialize`]. `fallback_reason` is set when MessagePack failed and JSON was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub format: PayloadFormat,
    pub fallback_reason: Option<String>,
}

impl Encoded {
    pub const fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Encoded, CodecError> {
    let mut bytes = vec![tag(PayloadFormat::MessagePack)];
    // Human-readable mode keeps ids and timestamps as strings, so payloads also decode
    // into schemaless values such as `serde_json::Value`.
    let mut serializer = rmp_serde::Serializer::new(&mut bytes)
        .with_struct_map()
        .with_human_readable();
    match value.serialize(&mut serializer) {
        Ok(()) => Ok(Encoded {
            bytes,
            format: PayloadFormat::MessagePack,
            fallback_reason: None,
        }),
        Err(msgpack_err) => {
            let mut bytes = vec![tag(PayloadFormat::Json)];
            serde_json::to_writer(&mut bytes, value)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
            Ok(Encoded {
                bytes,
                format: PayloadFormat::Json,
                fallback_reason: Some(msgpack_err.to_string()),
            })
        }
    }
}

pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let (&first, body) = bytes.split_first().ok_or(CodecError::Empty)?;
    let format = format_for_tag(first)?;
    match format {
        PayloadFormat::MessagePack => {
            let mut deserializer = rmp_serde::Deserializer::new(body).with_human_readable();
            T::deserialize(&mut deserializer).map_err(|e| CodecError::Decode {
                format,
                message: e.to_string(),
            })
        }
        PayloadFormat::Json => serde_json::from_slice(body).map_err(|e| CodecError::Decode {
            format,
            message: e.to_string(),
        }),
    }
}
