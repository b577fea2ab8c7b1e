//! Event payload serialization.
//!
//! The repository stores each event as bytes tagged with the content type
//! of the format that produced them. Reads decode with the format named by
//! the recorded content type, so a stream written under one format stays
//! readable after the repository is reconfigured to another.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported serialization formats for event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SerializationFormat {
    /// JSON format (default) - human-readable, good for debugging
    #[default]
    Json,
    /// MessagePack format - compact binary format
    MessagePack,
    /// Bincode format - fast binary format
    Bincode,
}

/// Failure to encode or decode an event payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    /// The payload could not be encoded.
    #[error("{format} encoding failed: {detail}")]
    Encode {
        /// Format that was used
        format: SerializationFormat,
        /// Underlying error message
        detail: String,
    },

    /// The payload could not be decoded.
    #[error("{format} decoding failed: {detail}")]
    Decode {
        /// Format that was used
        format: SerializationFormat,
        /// Underlying error message
        detail: String,
    },

    /// A recorded event names a content type no format understands.
    #[error("Unsupported content type '{0}'")]
    UnsupportedContentType(String),
}

impl SerializationFormat {
    /// Encodes `value` in this format.
    pub fn encode<T>(&self, value: &T) -> Result<Vec<u8>, SerializationError>
    where
        T: Serialize + ?Sized,
    {
        let encoded = match self {
            Self::Json => serde_json::to_vec(value).map_err(|e| e.to_string()),
            Self::MessagePack => rmp_serde::to_vec_named(value).map_err(|e| e.to_string()),
            Self::Bincode => bincode::serde::encode_to_vec(value, bincode::config::standard())
                .map_err(|e| e.to_string()),
        };
        encoded.map_err(|detail| SerializationError::Encode {
            format: *self,
            detail,
        })
    }

    /// Decodes a value previously encoded in this format.
    pub fn decode<T>(&self, data: &[u8]) -> Result<T, SerializationError>
    where
        T: DeserializeOwned,
    {
        let decoded = match self {
            Self::Json => serde_json::from_slice(data).map_err(|e| e.to_string()),
            Self::MessagePack => rmp_serde::from_slice(data).map_err(|e| e.to_string()),
            Self::Bincode => {
                bincode::serde::decode_from_slice(data, bincode::config::standard())
                    .map(|(value, _read)| value)
                    .map_err(|e| e.to_string())
            }
        };
        decoded.map_err(|detail| SerializationError::Decode {
            format: *self,
            detail,
        })
    }

    /// Returns the MIME type recorded alongside payloads of this format.
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::MessagePack => "application/msgpack",
            Self::Bincode => "application/x-bincode",
        }
    }

    /// Looks up the format that produced payloads of `mime_type`.
    pub fn from_mime_type(mime_type: &str) -> Result<Self, SerializationError> {
        match mime_type {
            "application/json" => Ok(Self::Json),
            "application/msgpack" => Ok(Self::MessagePack),
            "application/x-bincode" => Ok(Self::Bincode),
            other => Err(SerializationError::UnsupportedContentType(other.to_owned())),
        }
    }
}

impl std::fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "JSON"),
            Self::MessagePack => write!(f, "MessagePack"),
            Self::Bincode => write!(f, "Bincode"),
        }
    }
}

impl std::str::FromStr for SerializationFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "messagepack" | "msgpack" => Ok(Self::MessagePack),
            "bincode" => Ok(Self::Bincode),
            _ => Err(format!("Unknown serialization format: {s}")),
        }
    }
}
