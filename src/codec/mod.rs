//! # Codec
//!
//! Serialization strategy used by the typed cache facade. Payloads are plain
//! JSON or gzip-compressed JSON; neither form can equal the single-byte
//! not-found marker.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("failed to encode value: {0}")]
    Encode(String),

    #[error("failed to decode payload: {0}")]
    Decode(String),

    #[error("gzip stream error: {0}")]
    Compression(String),
}

/// Serialization strategy for cached values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    #[default]
    Json,
    /// JSON compressed with gzip at best compression
    JsonGzip,
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonGzip => "json_gzip",
        }
    }

    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        let json = serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))?;

        match self {
            Self::Json => Ok(json),
            Self::JsonGzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
                encoder
                    .write_all(&json)
                    .map_err(|e| CodecError::Compression(e.to_string()))?;
                encoder
                    .finish()
                    .map_err(|e| CodecError::Compression(e.to_string()))
            }
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Self::Json => serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string())),
            Self::JsonGzip => {
                let mut json = Vec::new();
                GzDecoder::new(bytes)
                    .read_to_end(&mut json)
                    .map_err(|e| CodecError::Compression(e.to_string()))?;
                serde_json::from_slice(&json).map_err(|e| CodecError::Decode(e.to_string()))
            }
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
