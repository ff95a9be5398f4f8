use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the sidecar process.
///
/// Sub-errors group by the taxonomy in SPEC_FULL.md §7: protocol, audio,
/// vad, stt, config, plus the cross-cutting fatal/transient variants. The
/// dispatcher maps variants to wire error codes; components never construct
/// wire messages themselves.
#[derive(Error, Debug)]
pub enum SidecarError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Vad(#[from] VadError),

    #[error(transparent)]
    Stt(#[from] SttError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("fatal error, cannot recover: {0}")]
    Fatal(String),

    #[error("transient error, will retry: {0}")]
    Transient(String),
}

impl From<std::io::Error> for SidecarError {
    fn from(err: std::io::Error) -> Self {
        SidecarError::Fatal(format!("io error: {err}"))
    }
}

impl From<tokio::task::JoinError> for SidecarError {
    fn from(err: tokio::task::JoinError) -> Self {
        SidecarError::Transient(format!("task join failed: {err}"))
    }
}

/// Malformed JSON, unknown method, oversize message, missing parameter.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("message exceeds maximum size of {limit} bytes")]
    MessageTooLarge { limit: usize },

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("missing parameter: {0}")]
    MissingParameter(String),
}

/// Empty buffer, decode failure, mid-stream STT invocation failure.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio buffer is empty or invalid")]
    InvalidAudio,

    #[error("pipeline error: {0}")]
    PipelineError(String),
}

#[derive(Debug, Error)]
pub enum VadError {
    #[error("VAD classification failed: {0}")]
    ClassificationFailed(String),

    #[error("invalid frame size: expected {expected}, got {actual}")]
    InvalidFrameSize { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum SttError {
    #[error("model not found: {path:?}")]
    ModelNotFound { path: Option<PathBuf> },

    #[error("model load failed: {0}")]
    LoadFailed(String),

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration parse error: {0}")]
    Parse(String),

    #[error("validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("missing required field: {0}")]
    MissingField(String),
}

/// How a background loop should react to a given error. Informational only;
/// the inbound and monitor loops decide for themselves whether to log and
/// continue or exit based on this classification.
#[derive(Debug, Clone)]
pub enum RecoveryStrategy {
    Retry { max_attempts: u32, delay: Duration },
    Continue,
    Fatal,
}

impl SidecarError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            SidecarError::Fatal(_) => RecoveryStrategy::Fatal,
            SidecarError::Transient(_) => RecoveryStrategy::Retry {
                max_attempts: 3,
                delay: Duration::from_millis(500),
            },
            _ => RecoveryStrategy::Continue,
        }
    }

    /// True if this error is safe to report to the host and keep running.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SidecarError::Fatal(_))
    }
}
