use webrtc_vad::{SampleRate, Vad, VadMode};

use crate::constants::{SAMPLE_RATE_HZ, VAD_AGGRESSIVENESS};

/// Thin wrapper around the third-party frame-level classifier (SPEC_FULL.md
/// §4.2 step 1). `webrtc-vad`'s aggressiveness levels map 0..3 onto
/// `Quality, LowBitrate, Aggressive, VeryAggressive`; the sidecar is fixed
/// at level 2 (`Aggressive`) and never exposes the dial to callers.
pub struct VadClassifier {
    vad: Vad,
}

impl VadClassifier {
    pub fn new() -> Self {
        let mode = aggressiveness_to_mode(VAD_AGGRESSIVENESS);
        let sample_rate = sample_rate_for_hz(SAMPLE_RATE_HZ);
        Self {
            vad: Vad::new_with_rate_and_mode(sample_rate, mode),
        }
    }

    /// Classifies one frame of 16-bit PCM samples. Library errors are
    /// treated as non-speech per SPEC_FULL.md §4.2 step 1.
    pub fn is_speech(&mut self, samples: &[i16]) -> bool {
        self.vad.is_voice_segment(samples).unwrap_or(false)
    }
}

impl Default for VadClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn aggressiveness_to_mode(level: u8) -> VadMode {
    match level {
        0 => VadMode::Quality,
        1 => VadMode::LowBitrate,
        2 => VadMode::Aggressive,
        _ => VadMode::VeryAggressive,
    }
}

fn sample_rate_for_hz(hz: u32) -> SampleRate {
    match hz {
        8_000 => SampleRate::Rate8kHz,
        16_000 => SampleRate::Rate16kHz,
        32_000 => SampleRate::Rate32kHz,
        48_000 => SampleRate::Rate48kHz,
        _ => SampleRate::Rate16kHz,
    }
}
