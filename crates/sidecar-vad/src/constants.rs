//! Audio framing and state-machine thresholds for the VAD pipeline.
//!
//! These are hardcoded rather than configurable: the sidecar speaks a fixed
//! wire format (320-byte frames) and tunes one VAD engine at one
//! aggressiveness level, so there is no caller-visible knob to expose.

/// Sample rate the VAD and the wire protocol agree on.
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Samples per 10 ms frame at 16 kHz mono.
pub const FRAME_SIZE_SAMPLES: usize = 160;

/// Bytes per frame: 160 samples * 2 bytes (16-bit signed PCM).
pub const FRAME_SIZE_BYTES: usize = FRAME_SIZE_SAMPLES * 2;

pub const CHANNELS_MONO: u16 = 1;

pub const FRAME_DURATION_MS: u64 = 10;

/// Consecutive speech frames required to transition into `in_speech` (300 ms).
pub const SPEECH_ONSET_FRAMES: u32 = 30;

/// Consecutive silence frames required to transition out of `in_speech` (500 ms).
pub const SPEECH_OFFSET_FRAMES: u32 = 50;

/// Capacity of the pre-roll ring buffer, in frames.
pub const PRE_ROLL_FRAMES: usize = 30;

/// Fixed WebRTC VAD aggressiveness level (0-3 scale; 2 == "Aggressive").
pub const VAD_AGGRESSIVENESS: u8 = 2;
