//! Wire protocol
//!
//! Every request is one line of JSON (a [`ClientMessage`]) optionally
//! followed by exactly `content_length` raw bytes of file data. Every response
//! is one line of JSON (a [`ServerMessage`]); a [`ServerMessage::File`]
//! response is followed by exactly `content_length` raw bytes.

use super::ServerError;
use crate::analysis::KeyEstimate;
use crate::error::AudioError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest accepted request line, newline included
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Messages sent from clients to the server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Health check
    Status {
        /// Request id
        id: Uuid,
    },
    /// Estimate the key of the attached file
    Analyze {
        /// Request id
        id: Uuid,
        /// Original filename; its extension must be allowed
        filename: String,
        /// Body size in bytes
        content_length: u64,
    },
    /// Transpose the attached file
    Transpose {
        /// Request id
        id: Uuid,
        /// Original filename; its extension must be allowed
        filename: String,
        /// Body size in bytes
        content_length: u64,
        /// Semitones, positive is up
        shift: i32,
        /// `mp3` (default) or `wav`
        #[serde(default)]
        format: Option<String>,
    },
}

impl ClientMessage {
    /// Create a new Status request
    pub fn new_status() -> Self {
        ClientMessage::Status { id: Uuid::new_v4() }
    }

    /// Create a new Analyze request for a body of `content_length` bytes
    pub fn new_analyze(filename: impl Into<String>, content_length: u64) -> Self {
        ClientMessage::Analyze {
            id: Uuid::new_v4(),
            filename: filename.into(),
            content_length,
        }
    }

    /// Create a new Transpose request for a body of `content_length` bytes
    pub fn new_transpose(
        filename: impl Into<String>,
        content_length: u64,
        shift: i32,
        format: Option<String>,
    ) -> Self {
        ClientMessage::Transpose {
            id: Uuid::new_v4(),
            filename: filename.into(),
            content_length,
            shift,
            format,
        }
    }

    /// Request id
    pub fn id(&self) -> Uuid {
        match self {
            ClientMessage::Status { id }
            | ClientMessage::Analyze { id, .. }
            | ClientMessage::Transpose { id, .. } => *id,
        }
    }

    /// Number of body bytes following the header line
    pub fn content_length(&self) -> u64 {
        match self {
            ClientMessage::Status { .. } => 0,
            ClientMessage::Analyze { content_length, .. }
            | ClientMessage::Transpose { content_length, .. } => *content_length,
        }
    }
}

/// Messages sent from server to client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Answer to a status request
    Status {
        /// Request id
        id: Uuid,
        /// Always `online`
        status: String,
        /// Human-readable description
        message: String,
    },
    /// Key estimate
    Key {
        /// Request id
        id: Uuid,
        /// Key label, e.g. `C` or `F#m`
        key: String,
        /// Confidence in [0, 1], two decimals
        confidence: f32,
    },
    /// Transposed file; `content_length` raw bytes follow this line
    File {
        /// Request id
        id: Uuid,
        /// Download filename
        filename: String,
        /// MIME type of the body
        mime_type: String,
        /// Body size in bytes
        content_length: u64,
    },
    /// Error response
    Error {
        /// Request id, nil if the request could not be parsed
        id: Uuid,
        /// Error classification tag
        kind: String,
        /// Caller-facing message
        error: String,
        /// True if the request itself was rejected
        client_error: bool,
    },
}

impl ServerMessage {
    /// Create the status response
    pub fn new_status(id: Uuid) -> Self {
        ServerMessage::Status {
            id,
            status: "online".to_string(),
            message: "Key detection and transposition service is running".to_string(),
        }
    }

    /// Create a Key response
    pub fn new_key(id: Uuid, estimate: KeyEstimate) -> Self {
        ServerMessage::Key {
            id,
            key: estimate.label,
            confidence: estimate.confidence,
        }
    }

    /// Create a File response header
    pub fn new_file(id: Uuid, filename: String, mime_type: &str, content_length: u64) -> Self {
        ServerMessage::File {
            id,
            filename,
            mime_type: mime_type.to_string(),
            content_length,
        }
    }

    /// Create an Error response carrying the caller-facing message
    pub fn from_error(id: Uuid, err: &AudioError) -> Self {
        ServerMessage::Error {
            id,
            kind: err.kind().as_str().to_string(),
            error: err.user_message(),
            client_error: err.is_client_error(),
        }
    }
}

/// Encode a client message into NDJSON format (JSON + newline)
pub fn encode_client_message(message: &ClientMessage) -> Result<String, ServerError> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    Ok(json)
}

/// Encode a server message into NDJSON format
pub fn encode_server_message(message: &ServerMessage) -> Result<String, ServerError> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    Ok(json)
}

/// Decode a line of JSON into a ClientMessage
pub fn decode_client_message(line: &str) -> Result<ClientMessage, ServerError> {
    Ok(serde_json::from_str(line.trim())?)
}

/// Decode a line of JSON into a ServerMessage
pub fn decode_server_message(line: &str) -> Result<ServerMessage, ServerError> {
    Ok(serde_json::from_str(line.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_encode_status_request() {
        let encoded = encode_client_message(&ClientMessage::new_status()).unwrap();
        assert!(encoded.ends_with('\n'));
        assert!(encoded.contains("\"type\":\"status\""));
    }

    #[test]
    fn test_transpose_format_is_optional() {
        let id = Uuid::new_v4();
        let line = format!(
            r#"{{"type":"transpose","id":"{}","filename":"a.wav","content_length":10,"shift":-3}}"#,
            id
        );
        let message = decode_client_message(&line).unwrap();
        assert_eq!(
            message,
            ClientMessage::Transpose {
                id,
                filename: "a.wav".to_string(),
                content_length: 10,
                shift: -3,
                format: None,
            }
        );
        assert_eq!(message.content_length(), 10);
        assert_eq!(message.id(), id);
    }

    #[test]
    fn test_key_response_carries_key_and_confidence() {
        let estimate = KeyEstimate {
            label: "F#m".to_string(),
            confidence: 0.77,
        };
        let encoded = encode_server_message(&ServerMessage::new_key(Uuid::nil(), estimate)).unwrap();
        let value: serde_json::Value = serde_json::from_str(encoded.trim()).unwrap();
        assert_eq!(value["type"], "key");
        assert_eq!(value["key"], "F#m");
        assert!((value["confidence"].as_f64().unwrap() - 0.77).abs() < 1e-6);
    }

    #[test]
    fn test_error_response_is_classified() {
        let err: AudioError = ValidationError::UnsupportedExtension("txt".to_string()).into();
        match ServerMessage::from_error(Uuid::nil(), &err) {
            ServerMessage::Error {
                kind, client_error, ..
            } => {
                assert_eq!(kind, "validation");
                assert!(client_error);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_malformed_line_is_serialization_error() {
        assert!(matches!(
            decode_client_message("{not json"),
            Err(ServerError::Serialization(_))
        ));
    }
}
