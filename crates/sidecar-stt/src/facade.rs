//! Sequences calls into a single [`SttBackend`] and tracks the two sizes
//! the resource monitor needs: the model the sidecar started with
//! (`initial_model`, the upgrade ceiling per SPEC_FULL.md §4.5) and the
//! model currently loaded (`current_model`).
//!
//! No teacher equivalent exists for this exact shape — the teacher's
//! `plugin_manager.rs::switch_plugin` unloads the old backend before
//! loading the new one, which loses the old backend entirely if the new
//! load fails. SPEC_FULL.md §4.4 requires the opposite: the backend itself
//! snapshots and only commits on success, so the facade here only needs to
//! serialize access, not implement rollback itself.

use tokio::sync::Mutex;

use sidecar_foundation::error::SttError;

use crate::backend::SttBackend;
use crate::types::{ModelSize, Transcription};

/// Owns the one loaded backend for the process lifetime (SPEC_FULL.md §3
/// invariant 4: at most one `load_model` executes at any time). The inner
/// mutex is held across the `.await` inside `load_model`/`transcribe`
/// deliberately — overlapping calls must queue, not interleave.
pub struct SttFacade {
    backend: Mutex<Box<dyn SttBackend>>,
    initial_model: ModelSize,
}

impl SttFacade {
    pub fn new(backend: Box<dyn SttBackend>, initial_model: ModelSize) -> Self {
        Self {
            backend: Mutex::new(backend),
            initial_model,
        }
    }

    /// The model size the sidecar was started with. The resource monitor
    /// never proposes an upgrade above this (SPEC_FULL.md §4.5).
    pub fn initial_model(&self) -> ModelSize {
        self.initial_model
    }

    pub async fn current_model(&self) -> Option<ModelSize> {
        self.backend.lock().await.current_model()
    }

    pub async fn load_model(&self, target: ModelSize, offline: bool) -> Result<ModelSize, SttError> {
        let mut guard = self.backend.lock().await;
        guard.load_model(target, offline).await
    }

    pub async fn transcribe(&self, pcm: &[u8], is_final: bool) -> Result<Transcription, SttError> {
        let mut guard = self.backend.lock().await;
        guard.transcribe(pcm, is_final).await
    }
}
