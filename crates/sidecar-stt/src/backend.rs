//! The backend contract a concrete STT engine (e.g. `sidecar-stt-whisper`)
//! implements. Trimmed from the teacher's `SttPlugin`/`SttPluginFactory`
//! multi-backend registry (`coldvox-stt::plugin`) down to the single
//! always-on backend this sidecar owns — there is no plugin discovery or
//! failover surface in SPEC_FULL.md, only model-size switching within one
//! backend.

use async_trait::async_trait;

use sidecar_foundation::error::SttError;

use crate::types::{ModelSize, Transcription};

/// One loaded model at a time (SPEC_FULL.md §4.4). Implementations own the
/// model discovery priority chain and the atomic load/rollback semantics
/// described there; the facade (`crate::facade::SttFacade`) only sequences
/// calls and tracks `current_model`/`initial_model`.
#[async_trait]
pub trait SttBackend: Send {
    /// Attempts to load `target`. On success, returns the size actually
    /// loaded — which may differ from `target` if discovery fell back to a
    /// bundled model. On failure, the backend's existing loaded model (if
    /// any) must remain fully usable; no partial state is observable.
    async fn load_model(&mut self, target: ModelSize, offline: bool) -> Result<ModelSize, SttError>;

    /// Transcribes PCM16LE audio. `language="ja"`, `beam_size=5`,
    /// `vad_filter=false` per SPEC_FULL.md §4.4; empty `pcm` is the
    /// caller's responsibility to reject before calling (see
    /// `SttFacade::transcribe`).
    async fn transcribe(&mut self, pcm: &[u8], is_final: bool) -> Result<Transcription, SttError>;

    /// The model size currently loaded, if any.
    fn current_model(&self) -> Option<ModelSize>;
}
