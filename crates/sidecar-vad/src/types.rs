use serde::{Deserialize, Serialize};

/// A 10 ms, 320-byte frame of 16-bit signed little-endian PCM mono at 16 kHz.
/// Frames are transient: owned for the duration of a single pipeline tick.
pub type Frame = Vec<u8>;

/// Whether the state machine currently considers itself inside an utterance.
/// SPEC_FULL.md §3 invariant 5: true iff the last emitted boundary event was
/// `SpeechStart` and no `SpeechEnd` has followed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Silence,
    Speech,
}

/// An accumulated speech segment: frames from onset (inclusive of pre-roll)
/// through offset (inclusive of the silence tail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub audio: Vec<u8>,
    pub duration_ms: u64,
}

impl Segment {
    pub fn frame_count(&self) -> u64 {
        self.duration_ms / crate::constants::FRAME_DURATION_MS
    }
}

/// Boundary events emitted by the VAD state machine (SPEC_FULL.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VadEvent {
    SpeechStart {
        timestamp_ms: u64,
        pre_roll: Vec<u8>,
    },
    SpeechEnd {
        timestamp_ms: u64,
        segment: Segment,
    },
}
