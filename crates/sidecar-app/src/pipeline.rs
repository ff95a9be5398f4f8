//! Bridges VAD boundary events to STT calls, schedules partial
//! transcriptions on a frame-count basis, and records latency (C3,
//! SPEC_FULL.md §4.3).
//!
//! No teacher equivalent exists for this exact shape — the teacher's audio
//! pipeline drives a capture device and a resampler that have no
//! counterpart here (this sidecar never touches an audio device, only the
//! byte buffers handed to it over the wire). The frame-count-based partial
//! scheduling itself is grounded on
//! `original_source/python-stt/stt_engine/vad_processor.py`'s
//! `frames_since_partial` counter, rebuilt without the `await
//! asyncio.sleep(0.01)` pacing call SPEC_FULL.md §9 explicitly forbids.

use std::sync::Arc;

use sidecar_stt::facade::SttFacade;
use sidecar_stt::types::Transcription;
use sidecar_telemetry::latency::{LatencyMetrics, LatencyTracker};
use sidecar_vad::{split_into_frames, VadEvent, VadStateMachine};

/// First partial fires 10 frames (100 ms) after onset; every subsequent
/// partial fires every 100 frames (1 000 ms) thereafter (SPEC_FULL.md §4.3
/// table).
const FIRST_PARTIAL_FRAMES: u32 = 10;
const SUBSEQUENT_PARTIAL_FRAMES: u32 = 100;

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    SpeechStart { timestamp_ms: u64 },
    Partial { transcription: Transcription, latency: LatencyMetrics },
    Final { transcription: Transcription, latency: LatencyMetrics },
    SpeechEnd { timestamp_ms: u64 },
    NoSpeech,
    Error { message: String },
}

/// Owned exclusively by the task that drives it (SPEC_FULL.md §5: "The VAD
/// internal state and pipeline buffers are owned exclusively by their
/// task; no external access").
pub struct AudioPipeline {
    vad: VadStateMachine,
    facade: Arc<SttFacade>,
    latency: LatencyTracker,
    frames_since_partial: u32,
    first_partial_done: bool,
}

impl AudioPipeline {
    pub fn new(facade: Arc<SttFacade>) -> Self {
        Self {
            vad: VadStateMachine::new(),
            facade,
            latency: LatencyTracker::new(),
            frames_since_partial: 0,
            first_partial_done: false,
        }
    }

    /// Processes one buffer end-to-end for a `process_audio_stream`
    /// request: splits into frames, feeds each through the VAD, requests
    /// partial/final transcriptions as thresholds are crossed, and folds
    /// in the `no_speech` fallback of SPEC_FULL.md §5 when nothing else
    /// fired.
    pub async fn process_stream(&mut self, audio: &[u8], now_ms: impl Fn() -> u64) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        for frame in split_into_frames(audio) {
            events.extend(self.on_frame(&frame, now_ms()).await);
        }
        if events.is_empty() && !self.vad.in_speech() && !self.vad.has_buffered_speech() {
            events.push(PipelineEvent::NoSpeech);
        }
        events
    }

    /// Feeds one frame through the VAD and reacts to whatever boundary
    /// event (if any) comes back, then checks the partial-scheduling
    /// threshold. Returns zero, one, or two events (a boundary event plus
    /// a partial can coincide on the same frame only at onset, which this
    /// function orders boundary-first).
    async fn on_frame(&mut self, frame: &[u8], now_ms: u64) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        let boundary = self.vad.process(&frame.to_vec());

        match boundary {
            Some(VadEvent::SpeechStart { timestamp_ms, .. }) => {
                self.latency.begin_segment(timestamp_ms);
                self.frames_since_partial = 0;
                self.first_partial_done = false;
                events.push(PipelineEvent::SpeechStart { timestamp_ms });
            }
            Some(VadEvent::SpeechEnd { timestamp_ms, segment }) => {
                match self.facade.transcribe(&segment.audio, true).await {
                    Ok(transcription) => {
                        let latency = self.latency.record_final(now_ms, timestamp_ms, transcription.processing_time_ms);
                        events.push(PipelineEvent::Final { transcription, latency });
                    }
                    Err(e) => events.push(PipelineEvent::Error {
                        message: e.to_string(),
                    }),
                }
                events.push(PipelineEvent::SpeechEnd { timestamp_ms });
                self.frames_since_partial = 0;
                return events;
            }
            None => {}
        }

        if self.vad.in_speech() {
            self.frames_since_partial += 1;
            let threshold = if self.first_partial_done {
                SUBSEQUENT_PARTIAL_FRAMES
            } else {
                FIRST_PARTIAL_FRAMES
            };
            if self.frames_since_partial >= threshold {
                self.frames_since_partial = 0;
                self.first_partial_done = true;
                match self.facade.transcribe(self.vad.segment_so_far(), false).await {
                    Ok(transcription) => {
                        let latency = self.latency.record_partial(now_ms, transcription.processing_time_ms);
                        events.push(PipelineEvent::Partial { transcription, latency });
                    }
                    Err(e) => events.push(PipelineEvent::Error {
                        message: e.to_string(),
                    }),
                }
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sidecar_foundation::error::SttError;
    use sidecar_stt::backend::SttBackend;
    use sidecar_stt::types::ModelSize;

    struct FakeBackend;

    #[async_trait]
    impl SttBackend for FakeBackend {
        async fn load_model(&mut self, target: ModelSize, _offline: bool) -> Result<ModelSize, SttError> {
            Ok(target)
        }

        async fn transcribe(&mut self, _pcm: &[u8], is_final: bool) -> Result<Transcription, SttError> {
            Ok(Transcription {
                text: "hello".to_string(),
                is_final,
                confidence: 0.9,
                language: "ja".to_string(),
                processing_time_ms: 5,
                model_size: ModelSize::Base,
            })
        }

        fn current_model(&self) -> Option<ModelSize> {
            Some(ModelSize::Base)
        }
    }

    fn facade() -> Arc<SttFacade> {
        Arc::new(SttFacade::new(Box::new(FakeBackend), ModelSize::Base))
    }

    fn tone_frame() -> Vec<u8> {
        let mut bytes = Vec::with_capacity(sidecar_vad::FRAME_SIZE_BYTES);
        for i in 0..sidecar_vad::FRAME_SIZE_SAMPLES {
            let phase = (i as f32) * 0.2;
            let sample = (phase.sin() * i16::MAX as f32) as i16;
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    fn silence_frame() -> Vec<u8> {
        vec![0u8; sidecar_vad::FRAME_SIZE_BYTES]
    }

    #[tokio::test]
    async fn pure_silence_emits_a_single_no_speech_event() {
        let mut pipeline = AudioPipeline::new(facade());
        let audio: Vec<u8> = (0..80).flat_map(|_| silence_frame()).collect();
        let events = pipeline.process_stream(&audio, || 0).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PipelineEvent::NoSpeech));
    }

    #[tokio::test]
    async fn thirty_speech_then_fifty_silence_frames_yield_start_final_end() {
        let mut pipeline = AudioPipeline::new(facade());
        let audio: Vec<u8> = (0..30)
            .flat_map(|_| tone_frame())
            .chain((0..50).flat_map(|_| silence_frame()))
            .collect();
        let events = pipeline.process_stream(&audio, || 10).await;
        assert!(matches!(events[0], PipelineEvent::SpeechStart { .. }));
        assert!(events.iter().any(|e| matches!(e, PipelineEvent::Final { .. })));
        assert!(matches!(events.last().unwrap(), PipelineEvent::SpeechEnd { .. }));
    }

    #[tokio::test]
    async fn first_partial_fires_ten_frames_after_onset_then_every_hundred() {
        let mut pipeline = AudioPipeline::new(facade());
        // 30 onset frames + 250 more speech frames: first partial at frame
        // 40 (10 after onset), second at frame 140, third at frame 240.
        let audio: Vec<u8> = (0..280).flat_map(|_| tone_frame()).collect();
        let events = pipeline.process_stream(&audio, || 20).await;
        let partials = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::Partial { .. }))
            .count();
        assert_eq!(partials, 3);
    }
}
