//! The message vocabulary spoken over an open pairing channel, and the
//! base64 bridging between binary payloads and their text-safe wire form.
//!
//! Each logical event (one shutter press, one finished report) is exactly
//! one message; there is no chunking or streaming.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::common::errors::PairError;

pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Discriminated payload exchanged between the two roles.
///
/// The JSON shape is the external contract: `{"type":"photo","photo":...}`
/// and `{"type":"pdf","data":...,"filename":...,"patientName":...}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    Photo {
        /// JPEG as a data URL, exactly as the capture surface produced it.
        photo: String,
    },
    Pdf {
        data: String,
        #[serde(default)]
        filename: String,
        #[serde(rename = "patientName", default)]
        patient_name: String,
    },
    /// Message types this build does not know. Receivers drop them so newer
    /// peers can talk to older ones.
    #[serde(other)]
    Unknown,
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn decode_bytes(encoded: &str) -> Result<Vec<u8>, PairError> {
    BASE64
        .decode(encoded.trim())
        .map_err(|err| PairError::TransferEncodingFailure(err.to_string()))
}

pub fn jpeg_data_url(jpeg: &[u8]) -> String {
    format!("{JPEG_DATA_URL_PREFIX}{}", BASE64.encode(jpeg))
}

/// Recover raw JPEG bytes from a `photo` field, with or without its data-URL
/// envelope.
pub fn photo_bytes(photo: &str) -> Result<Vec<u8>, PairError> {
    let encoded = if photo.starts_with("data:") {
        match photo.split_once("base64,") {
            Some((_, rest)) => rest,
            None => {
                return Err(PairError::TransferEncodingFailure(
                    "photo data URL is not base64-encoded".to_string(),
                ))
            }
        }
    } else {
        photo
    };
    decode_bytes(encoded)
}

pub(crate) fn encode_frame(
    message: &WireMessage,
    max_frame_bytes: usize,
) -> Result<Vec<u8>, PairError> {
    let bytes = serde_json::to_vec(message)
        .map_err(|err| PairError::TransferEncodingFailure(err.to_string()))?;
    if bytes.len() > max_frame_bytes {
        return Err(PairError::TransferEncodingFailure(format!(
            "encoded message is {} bytes, channel limit is {}",
            bytes.len(),
            max_frame_bytes
        )));
    }
    Ok(bytes)
}

pub(crate) fn decode_frame(bytes: &[u8]) -> Result<WireMessage, PairError> {
    serde_json::from_slice(bytes).map_err(|err| PairError::TransferEncodingFailure(err.to_string()))
}
