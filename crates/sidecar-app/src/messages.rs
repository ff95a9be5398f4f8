//! Wire message shapes for the stdio protocol (SPEC_FULL.md §4.1/§6.1).
//!
//! Inbound messages are parsed loosely (`params`/`method` as a raw
//! [`serde_json::Value`]) so the channel layer can reject malformed input
//! before the dispatcher ever sees a typed request. Outbound messages are
//! always wrapped in [`Envelope`], which stamps `"version": "1.0"` on every
//! line per §6.1.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: &str = "1.0";

/// One parsed inbound line, before `params` has been interpreted against a
/// specific method's expected shape.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Request {
        id: String,
        method: String,
        #[serde(default)]
        params: Value,
        #[serde(default)]
        version: Option<String>,
    },
    Ping {
        id: String,
        #[serde(default)]
        version: Option<String>,
    },
    Shutdown {
        #[serde(default)]
        version: Option<String>,
    },
}

impl Inbound {
    /// The protocol version the sender claimed, if present. A mismatch is
    /// logged at warning level by the caller, never rejected (§4.1 framing
    /// rules: forward compatibility).
    pub fn version(&self) -> Option<&str> {
        match self {
            Inbound::Request { version, .. } => version.as_deref(),
            Inbound::Ping { version, .. } => version.as_deref(),
            Inbound::Shutdown { version, .. } => version.as_deref(),
        }
    }
}

/// Wraps any outbound payload with the `version` field every outbound
/// message must carry (§6.1).
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub version: &'static str,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Response {
        id: String,
        result: Value,
    },
    Event {
        #[serde(rename = "eventType")]
        event_type: &'static str,
        data: Value,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(rename = "errorCode")]
        error_code: &'static str,
        #[serde(rename = "errorMessage")]
        error_message: String,
        recoverable: bool,
    },
    Ready {
        message: String,
    },
    Pong {
        id: String,
    },
}

impl Outbound {
    pub fn response(id: String, result: Value) -> Self {
        Outbound::Response { id, result }
    }

    pub fn event(event_type: &'static str, data: Value) -> Self {
        Outbound::Event { event_type, data }
    }

    pub fn error(id: Option<String>, error_code: &'static str, error_message: String, recoverable: bool) -> Self {
        Outbound::Error {
            id,
            error_code,
            error_message,
            recoverable,
        }
    }

    pub fn ready(message: impl Into<String>) -> Self {
        Outbound::Ready {
            message: message.into(),
        }
    }

    pub fn pong(id: String) -> Self {
        Outbound::Pong { id }
    }
}

/// Maps a [`sidecar_foundation::error::SidecarError`] to one of the §6.1
/// wire error codes. Lives here (not on the error type itself) per
/// SPEC_FULL.md §10.2: components never know about the wire format.
pub fn error_code_for(err: &sidecar_foundation::error::SidecarError) -> &'static str {
    use sidecar_foundation::error::{AudioError, ProtocolError, SidecarError, SttError};

    match err {
        SidecarError::Protocol(ProtocolError::InvalidJson(_)) => "INVALID_JSON",
        SidecarError::Protocol(ProtocolError::MessageTooLarge { .. }) => "INVALID_MESSAGE",
        SidecarError::Protocol(ProtocolError::UnknownType(_)) => "UNKNOWN_TYPE",
        SidecarError::Protocol(ProtocolError::UnknownMethod(_)) => "UNKNOWN_METHOD",
        SidecarError::Protocol(ProtocolError::MissingParameter(_)) => "MISSING_PARAMETER",
        SidecarError::Audio(AudioError::InvalidAudio) => "INVALID_AUDIO",
        SidecarError::Audio(AudioError::PipelineError(_)) => "AUDIO_PIPELINE_ERROR",
        SidecarError::Stt(SttError::ModelNotFound { .. }) => "MODEL_NOT_FOUND",
        SidecarError::Stt(SttError::LoadFailed(_)) => "MODEL_LOAD_ERROR",
        SidecarError::Stt(SttError::TranscriptionFailed(_)) => "AUDIO_PIPELINE_ERROR",
        _ => "INTERNAL_ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_with_params() {
        let line = r#"{"type":"request","id":"1","method":"process_audio","params":{"audio_data":[1,2,3]},"version":"1.0"}"#;
        let parsed: Inbound = serde_json::from_str(line).unwrap();
        match parsed {
            Inbound::Request { id, method, params, .. } => {
                assert_eq!(id, "1");
                assert_eq!(method, "process_audio");
                assert_eq!(params["audio_data"], serde_json::json!([1, 2, 3]));
            }
            other => panic!("expected Request, got {other:?}"),
        }
    }

    #[test]
    fn ping_requires_id() {
        let line = r#"{"type":"ping","id":"7"}"#;
        let parsed: Inbound = serde_json::from_str(line).unwrap();
        assert!(matches!(parsed, Inbound::Ping { id, .. } if id == "7"));
    }

    #[test]
    fn shutdown_has_no_id() {
        let line = r#"{"type":"shutdown"}"#;
        let parsed: Inbound = serde_json::from_str(line).unwrap();
        assert!(matches!(parsed, Inbound::Shutdown { .. }));
    }

    #[test]
    fn envelope_stamps_protocol_version() {
        let msg = Envelope::new(Outbound::pong("3".to_string()));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["type"], "pong");
    }

    #[test]
    fn error_without_id_omits_the_field() {
        let msg = Outbound::error(None, "INVALID_JSON", "bad json".to_string(), true);
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("id").is_none());
    }
}
