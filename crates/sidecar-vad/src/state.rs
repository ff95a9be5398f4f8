use std::collections::VecDeque;

use crate::clock::{SystemWallClock, WallClock};
use crate::constants::{
    FRAME_SIZE_BYTES, FRAME_SIZE_SAMPLES, PRE_ROLL_FRAMES, SPEECH_OFFSET_FRAMES,
    SPEECH_ONSET_FRAMES,
};
use crate::engine::VadClassifier;
use crate::types::{Frame, Segment, VadEvent, VadState};

/// Splits a byte buffer into complete 320-byte frames; a trailing partial
/// frame is discarded (SPEC_FULL.md §4.2, testable property §8.1).
pub fn split_into_frames(bytes: &[u8]) -> Vec<Frame> {
    bytes
        .chunks_exact(FRAME_SIZE_BYTES)
        .map(|chunk| chunk.to_vec())
        .collect()
}

fn frame_to_samples(frame: &[u8]) -> Vec<i16> {
    frame
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// The onset/offset debounce state machine described in SPEC_FULL.md §4.2.
/// Owns its pre-roll ring buffer and segment accumulator exclusively; no
/// external task observes this state concurrently (§5).
pub struct VadStateMachine {
    classifier: VadClassifier,
    clock: Box<dyn WallClock>,
    state: VadState,
    pre_roll: VecDeque<Frame>,
    segment: Vec<u8>,
    speech_run: u32,
    silence_run: u32,
}

impl VadStateMachine {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemWallClock))
    }

    pub fn with_clock(clock: Box<dyn WallClock>) -> Self {
        Self {
            classifier: VadClassifier::new(),
            clock,
            state: VadState::Silence,
            pre_roll: VecDeque::with_capacity(PRE_ROLL_FRAMES),
            segment: Vec::new(),
            speech_run: 0,
            silence_run: 0,
        }
    }

    pub fn in_speech(&self) -> bool {
        self.state == VadState::Speech
    }

    pub fn has_buffered_speech(&self) -> bool {
        !self.segment.is_empty()
    }

    /// Current accumulated segment bytes (including pre-roll), used by the
    /// audio pipeline to request partial transcriptions mid-utterance.
    pub fn segment_so_far(&self) -> &[u8] {
        &self.segment
    }

    pub fn process(&mut self, frame: &Frame) -> Option<VadEvent> {
        debug_assert_eq!(frame.len(), FRAME_SIZE_BYTES);
        let samples = frame_to_samples(frame);
        let is_speech = if samples.len() == FRAME_SIZE_SAMPLES {
            self.classifier.is_speech(&samples)
        } else {
            false
        };

        match self.state {
            VadState::Silence => self.process_silence(frame, is_speech),
            VadState::Speech => self.process_speech(frame, is_speech),
        }
    }

    fn process_silence(&mut self, frame: &Frame, is_speech: bool) -> Option<VadEvent> {
        if is_speech {
            self.speech_run += 1;
        } else {
            self.speech_run = 0;
        }

        // Pre-roll is a sliding window regardless of classification outcome;
        // a non-speech frame during onset accumulation must not drain it.
        if self.pre_roll.len() == PRE_ROLL_FRAMES {
            self.pre_roll.pop_front();
        }
        self.pre_roll.push_back(frame.clone());

        if self.speech_run >= SPEECH_ONSET_FRAMES {
            self.state = VadState::Speech;
            self.speech_run = 0;
            self.silence_run = 0;

            let pre_roll: Vec<u8> = self.pre_roll.iter().flatten().copied().collect();
            self.segment = pre_roll.clone();
            self.pre_roll.clear();

            return Some(VadEvent::SpeechStart {
                timestamp_ms: self.clock.now_ms(),
                pre_roll,
            });
        }
        None
    }

    fn process_speech(&mut self, frame: &Frame, is_speech: bool) -> Option<VadEvent> {
        self.segment.extend_from_slice(frame);

        if is_speech {
            self.silence_run = 0;
        } else {
            self.silence_run += 1;
        }

        if self.silence_run >= SPEECH_OFFSET_FRAMES {
            self.state = VadState::Silence;
            self.silence_run = 0;
            self.speech_run = 0;

            let audio = std::mem::take(&mut self.segment);
            let duration_ms = (audio.len() / FRAME_SIZE_BYTES) as u64 * crate::constants::FRAME_DURATION_MS;

            return Some(VadEvent::SpeechEnd {
                timestamp_ms: self.clock.now_ms(),
                segment: Segment { audio, duration_ms },
            });
        }
        None
    }
}

impl Default for VadStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence_frame() -> Frame {
        vec![0u8; FRAME_SIZE_BYTES]
    }

    // A loud full-scale tone reliably classifies as speech under webrtc-vad
    // at any aggressiveness; used as the "speech" fixture in unit tests.
    fn tone_frame() -> Frame {
        let mut bytes = Vec::with_capacity(FRAME_SIZE_BYTES);
        for i in 0..FRAME_SIZE_SAMPLES {
            let phase = (i as f32) * 0.2;
            let sample = (phase.sin() * i16::MAX as f32) as i16;
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn split_into_frames_discards_trailing_remainder() {
        let bytes = vec![0u8; FRAME_SIZE_BYTES * 3 + 10];
        let frames = split_into_frames(&bytes);
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() == FRAME_SIZE_BYTES));
    }

    #[test]
    fn twenty_nine_speech_frames_do_not_trigger_onset() {
        let mut vad = VadStateMachine::new();
        for _ in 0..29 {
            assert!(vad.process(&tone_frame()).is_none());
        }
        assert!(!vad.in_speech());
    }

    #[test]
    fn thirtieth_speech_frame_triggers_onset() {
        let mut vad = VadStateMachine::new();
        let mut event = None;
        for _ in 0..30 {
            event = vad.process(&tone_frame());
        }
        assert!(matches!(event, Some(VadEvent::SpeechStart { .. })));
        assert!(vad.in_speech());
    }

    #[test]
    fn non_speech_frame_during_onset_does_not_drain_pre_roll() {
        let mut vad = VadStateMachine::new();
        for _ in 0..10 {
            vad.process(&tone_frame());
        }
        // One silence frame resets the speech run counter but the pre-roll
        // ring must still retain its most recent frames.
        vad.process(&silence_frame());
        assert_eq!(vad.pre_roll.len(), PRE_ROLL_FRAMES.min(11));
    }

    #[test]
    fn offset_requires_fifty_consecutive_silence_frames() {
        let mut vad = VadStateMachine::new();
        for _ in 0..30 {
            vad.process(&tone_frame());
        }
        assert!(vad.in_speech());
        for _ in 0..49 {
            assert!(vad.process(&silence_frame()).is_none());
        }
        assert!(vad.in_speech());
        let event = vad.process(&silence_frame());
        assert!(matches!(event, Some(VadEvent::SpeechEnd { .. })));
        assert!(!vad.in_speech());
    }

    #[test]
    fn speech_frame_during_offset_countdown_does_not_truncate_segment() {
        let mut vad = VadStateMachine::new();
        for _ in 0..30 {
            vad.process(&tone_frame());
        }
        for _ in 0..10 {
            vad.process(&silence_frame());
        }
        // A speech frame resets the silence countdown but must remain in
        // the segment payload.
        vad.process(&tone_frame());
        assert!(vad.in_speech());
        let len_before = vad.segment.len();
        assert!(len_before > 0);
    }
}
