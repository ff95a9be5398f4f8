//! whisper.cpp-backed [`SttBackend`] implementation. Grounded on
//! `Coldaine-ColdVox/crates/coldvox-stt/src/plugins/whisper_plugin.rs` for
//! the overall plugin shape and
//! `Coldaine-ColdVox/crates/coldvox-stt/src/plugins/candle_whisper_plugin.rs`
//! for the `avg_logprob -> confidence` conversion, rebuilt against
//! `whisper-rs`'s `WhisperContext`/`WhisperState` API (the teacher's own
//! `whisper_plugin.rs` actually binds to `faster-whisper-rs` via `pyo3`,
//! which this sidecar does not carry — see DESIGN.md).

mod discovery;

use tracing::info;

use async_trait::async_trait;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use sidecar_foundation::error::SttError;
use sidecar_stt::backend::SttBackend;
use sidecar_stt::types::{ModelSize, Transcription};

struct LoadedModel {
    ctx: WhisperContext,
    size: ModelSize,
    path: std::path::PathBuf,
}

/// Owns at most one `WhisperContext` at a time. `load_model` follows the
/// snapshot-before-mutate, restore-on-error pattern from
/// `whisper_client.py::load_model` (SPEC_FULL.md §4.4): the old model is
/// only dropped after the new one has been constructed successfully.
pub struct WhisperBackend {
    offline: bool,
    model: Option<LoadedModel>,
}

impl WhisperBackend {
    pub fn new(offline: bool) -> Self {
        Self {
            offline,
            model: None,
        }
    }

    /// The filesystem path of the currently loaded model, if any — needed
    /// only for the `whisper_model_ready` startup event's `model_path`
    /// field (SPEC_FULL.md §6.1), not part of the general `SttBackend`
    /// contract since that field is whisper-specific.
    pub fn current_model_path(&self) -> Option<&std::path::Path> {
        self.model.as_ref().map(|m| m.path.as_path())
    }
}

#[async_trait]
impl SttBackend for WhisperBackend {
    async fn load_model(&mut self, target: ModelSize, offline: bool) -> Result<ModelSize, SttError> {
        self.offline = offline;
        let resolved = discovery::discover(target, self.offline)?;

        let ctx = WhisperContext::new_with_params(
            &resolved.path.to_string_lossy(),
            WhisperContextParameters::default(),
        )
        .map_err(|e| SttError::LoadFailed(e.to_string()))?;

        // Construction succeeded: only now is the previous model (if any)
        // released. Nothing above this line mutated `self.model`, so a
        // failure in `new_with_params` leaves the old model fully usable.
        let actual_size = resolved.size;
        info!(
            target: "sidecar::stt",
            model_size = %actual_size,
            path = %resolved.path.display(),
            "loaded whisper model"
        );
        self.model = Some(LoadedModel {
            ctx,
            size: actual_size,
            path: resolved.path,
        });
        Ok(actual_size)
    }

    async fn transcribe(&mut self, pcm: &[u8], is_final: bool) -> Result<Transcription, SttError> {
        if pcm.is_empty() {
            return Err(SttError::TranscriptionFailed("empty audio".to_string()));
        }
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| SttError::TranscriptionFailed("no model loaded".to_string()))?;

        let samples = pcm_bytes_to_f32(pcm);

        let start = std::time::Instant::now();
        let mut state = model
            .ctx
            .create_state()
            .map_err(|e| SttError::TranscriptionFailed(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: 5,
            patience: -1.0,
        });
        params.set_language(Some("ja"));
        params.set_no_context(true);
        // whisper-rs has no first-class `vad_filter` toggle; leaving its
        // own VAD disabled is the default, matching `vad_filter=false`.

        state
            .full(params, &samples)
            .map_err(|e| SttError::TranscriptionFailed(e.to_string()))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| SttError::TranscriptionFailed(e.to_string()))?;

        let mut text = String::new();
        let mut segment_logprobs = Vec::with_capacity(num_segments as usize);
        for i in 0..num_segments {
            let segment_text = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::TranscriptionFailed(e.to_string()))?;
            text.push_str(&segment_text);

            if let Some(avg) = mean_token_logprob(&state, i) {
                segment_logprobs.push(avg);
            }
        }

        let confidence = if segment_logprobs.is_empty() {
            0.0
        } else {
            let mean: f32 = segment_logprobs.iter().sum::<f32>() / segment_logprobs.len() as f32;
            mean.exp().clamp(0.0, 1.0)
        };

        Ok(Transcription {
            text: text.trim().to_string(),
            is_final,
            confidence,
            language: "ja".to_string(),
            processing_time_ms: start.elapsed().as_millis() as u64,
            model_size: model.size,
        })
    }

    fn current_model(&self) -> Option<ModelSize> {
        self.model.as_ref().map(|m| m.size)
    }
}

/// `whisper_client.py` divides by 32768 to go from PCM16 to normalized
/// float; this reads PCM16LE bytes directly into that same range.
fn pcm_bytes_to_f32(pcm: &[u8]) -> Vec<f32> {
    pcm.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32_768.0)
        .collect()
}

/// Mean log-probability across the tokens of segment `i`, used as the
/// per-segment `avg_logprob` input to the confidence formula.
fn mean_token_logprob(state: &whisper_rs::WhisperState, segment: i32) -> Option<f32> {
    let n_tokens = state.full_n_tokens(segment).ok()?;
    if n_tokens == 0 {
        return None;
    }
    let mut sum = 0.0f32;
    for t in 0..n_tokens {
        let data = state.full_get_token_data(segment, t).ok()?;
        sum += data.plog;
    }
    Some(sum / n_tokens as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_bytes_to_f32_normalizes_full_scale() {
        let bytes = i16::MAX.to_le_bytes();
        let samples = pcm_bytes_to_f32(&bytes);
        assert_eq!(samples.len(), 1);
        assert!((samples[0] - 0.999_969).abs() < 1e-4);
    }

    #[test]
    fn pcm_bytes_to_f32_discards_trailing_odd_byte() {
        let samples = pcm_bytes_to_f32(&[0, 0, 1]);
        assert_eq!(samples.len(), 1);
    }
}
