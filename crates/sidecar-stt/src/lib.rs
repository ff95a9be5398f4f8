//! Speech-to-text facade for the STT sidecar: the [`backend::SttBackend`]
//! trait a concrete engine implements, the [`facade::SttFacade`] that
//! sequences calls into it, and the shared [`types::ModelSize`]/
//! [`types::Transcription`] value types. Model discovery and the actual
//! inference call live in the backend crate (`sidecar-stt-whisper`); this
//! crate only defines the contract between it and the rest of the sidecar.

pub mod backend;
pub mod facade;
pub mod types;

pub use backend::SttBackend;
pub use facade::SttFacade;
pub use types::{ModelSize, Transcription};
