//! Routes one parsed inbound line to the right component, and turns
//! whatever comes back into outbound wire messages (SPEC_FULL.md §6.1).
//!
//! No teacher equivalent exists for this shape — the teacher has no stdio
//! protocol at all. Grounded instead on SPEC_FULL.md §6.1's message table
//! directly, using the error-code mapping table built in `messages.rs` per
//! §10.2 ("that mapping lives next to the dispatcher, not inside each
//! component").

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;

use sidecar_foundation::error::{AudioError, ProtocolError, SidecarError};
use sidecar_foundation::shutdown::ShutdownHandle;
use sidecar_resource_monitor::{MonitorCallbacks, MonitorHandle};
use sidecar_stt::facade::SttFacade;
use sidecar_stt::types::ModelSize;

use crate::ipc::OutputSink;
use crate::messages::{error_code_for, Outbound};
use crate::pipeline::{AudioPipeline, PipelineEvent};

/// Wires the resource monitor's downgrade/upgrade-proposal/pause-recording
/// callbacks (SPEC_FULL.md §4.5) to C4 and the outbound channel. A downgrade
/// actually loads the smaller model before the monitor commits to it in its
/// own state; an upgrade proposal and a pause are observation-only events —
/// the former awaits a separate `approve_upgrade` request
/// ([`Dispatcher::handle_approve_upgrade`]).
pub struct SidecarMonitorCallbacks {
    facade: Arc<SttFacade>,
    output: OutputSink,
    offline: bool,
}

impl SidecarMonitorCallbacks {
    pub fn new(facade: Arc<SttFacade>, output: OutputSink, offline: bool) -> Self {
        Self { facade, output, offline }
    }
}

#[async_trait::async_trait]
impl MonitorCallbacks for SidecarMonitorCallbacks {
    async fn on_downgrade(&self, old: ModelSize, new: ModelSize) -> Option<ModelSize> {
        match self.facade.load_model(new, self.offline).await {
            Ok(actual) => {
                self.output.send(Outbound::event(
                    "model_change",
                    json!({"from": old, "to": actual, "reason": "downgrade"}),
                ));
                Some(actual)
            }
            Err(e) => {
                tracing::error!(target: "sidecar::monitor", from = %old, to = %new, error = %e, "downgrade load failed");
                None
            }
        }
    }

    async fn on_upgrade_proposal(&self, current: ModelSize, proposed: ModelSize) {
        self.output.send(Outbound::event(
            "upgrade_proposal",
            json!({"current_model": current, "proposed_model": proposed}),
        ));
    }

    async fn on_pause_recording(&self) {
        self.output.send(Outbound::event("recording_paused", json!({})));
    }
}

pub struct Dispatcher {
    output: OutputSink,
    facade: Arc<SttFacade>,
    pipeline: Mutex<AudioPipeline>,
    monitor: MonitorHandle,
    shutdown: ShutdownHandle,
    offline: bool,
}

impl Dispatcher {
    pub fn new(
        output: OutputSink,
        facade: Arc<SttFacade>,
        monitor: MonitorHandle,
        shutdown: ShutdownHandle,
        offline: bool,
    ) -> Self {
        let pipeline = Mutex::new(AudioPipeline::new(facade.clone()));
        Self {
            output,
            facade,
            pipeline,
            monitor,
            shutdown,
            offline,
        }
    }

    /// Parses and handles one inbound line, emitting whatever outbound
    /// messages result via the dispatcher's [`OutputSink`]. Never panics on
    /// malformed input — every failure path ends in an `error` message
    /// instead (§4.1 failure modes).
    pub async fn handle_line(&self, line: &str) {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                self.emit_error(None, &SidecarError::Protocol(ProtocolError::InvalidJson(e.to_string())));
                return;
            }
        };

        if let Some(version) = value.get("version").and_then(Value::as_str) {
            if version != crate::messages::PROTOCOL_VERSION {
                tracing::warn!(target: "sidecar::ipc", %version, "message declares a different protocol version");
            }
        }

        let msg_type = value.get("type").and_then(Value::as_str).unwrap_or("");
        let id = value.get("id").and_then(Value::as_str).map(str::to_string);

        match msg_type {
            "request" => self.handle_request(id, &value).await,
            "ping" => match id {
                Some(id) => self.output.send(Outbound::pong(id)),
                None => self.emit_error(
                    None,
                    &SidecarError::Protocol(ProtocolError::MissingParameter("id".to_string())),
                ),
            },
            "shutdown" => {
                tracing::info!(target: "sidecar::ipc", "shutdown requested");
                self.shutdown.shutdown();
            }
            other => self.emit_error(
                id,
                &SidecarError::Protocol(ProtocolError::UnknownType(other.to_string())),
            ),
        }
    }

    async fn handle_request(&self, id: Option<String>, value: &Value) {
        let Some(id) = id else {
            self.emit_error(
                None,
                &SidecarError::Protocol(ProtocolError::MissingParameter("id".to_string())),
            );
            return;
        };
        let Some(method) = value.get("method").and_then(Value::as_str) else {
            self.emit_error(
                Some(id),
                &SidecarError::Protocol(ProtocolError::MissingParameter("method".to_string())),
            );
            return;
        };
        let params = value.get("params").cloned().unwrap_or(Value::Null);

        match method {
            "process_audio" => self.handle_process_audio(id, &params).await,
            "process_audio_stream" => self.handle_process_audio_stream(id, &params).await,
            "approve_upgrade" => self.handle_approve_upgrade(id, &params).await,
            "stop_processing" => {
                self.output.send(Outbound::response(id, json!({"status": "acknowledged"})));
            }
            other => self.emit_error(
                Some(id),
                &SidecarError::Protocol(ProtocolError::UnknownMethod(other.to_string())),
            ),
        }
    }

    async fn handle_process_audio(&self, id: String, params: &Value) {
        let audio = match extract_audio_data(params) {
            Ok(audio) => audio,
            Err(err) => {
                self.emit_error(Some(id), &err);
                return;
            }
        };
        if audio.is_empty() {
            self.emit_error(Some(id), &SidecarError::Audio(AudioError::InvalidAudio));
            return;
        }

        match self.facade.transcribe(&audio, true).await {
            Ok(transcription) => {
                self.output.send(Outbound::response(id, serde_json::to_value(transcription).unwrap()));
            }
            Err(e) => self.emit_error(Some(id), &SidecarError::Stt(e)),
        }
    }

    async fn handle_process_audio_stream(&self, id: String, params: &Value) {
        let audio = match extract_audio_data(params) {
            Ok(audio) => audio,
            Err(err) => {
                self.emit_error(Some(id), &err);
                return;
            }
        };

        let mut pipeline = self.pipeline.lock().await;
        let events = pipeline.process_stream(&audio, || now_ms()).await;
        drop(pipeline);

        for event in events {
            self.emit_pipeline_event(&id, event);
        }
    }

    fn emit_pipeline_event(&self, request_id: &str, event: PipelineEvent) {
        match event {
            PipelineEvent::SpeechStart { timestamp_ms } => {
                self.output
                    .send(Outbound::event("speech_start", json!({"requestId": request_id, "timestamp_ms": timestamp_ms})));
            }
            PipelineEvent::Partial { transcription, latency } => {
                self.output.send(Outbound::event(
                    "partial_text",
                    json!({"requestId": request_id, "transcription": transcription, "latency": latency}),
                ));
            }
            PipelineEvent::Final { transcription, latency } => {
                self.output.send(Outbound::event(
                    "final_text",
                    json!({"requestId": request_id, "transcription": transcription, "latency": latency}),
                ));
            }
            PipelineEvent::SpeechEnd { timestamp_ms } => {
                self.output
                    .send(Outbound::event("speech_end", json!({"requestId": request_id, "timestamp_ms": timestamp_ms})));
            }
            PipelineEvent::NoSpeech => {
                self.output.send(Outbound::event("no_speech", json!({"requestId": request_id})));
            }
            PipelineEvent::Error { message } => {
                self.output.send(Outbound::error(
                    Some(request_id.to_string()),
                    "AUDIO_PIPELINE_ERROR",
                    message,
                    true,
                ));
            }
        }
    }

    async fn handle_approve_upgrade(&self, id: String, params: &Value) {
        let Some(raw) = params.get("target_model").and_then(Value::as_str) else {
            self.emit_error(
                Some(id),
                &SidecarError::Protocol(ProtocolError::MissingParameter("target_model".to_string())),
            );
            return;
        };
        let Some(target) = ModelSize::parse(raw) else {
            self.emit_error(
                Some(id),
                &SidecarError::Protocol(ProtocolError::MissingParameter(format!("target_model: unrecognized '{raw}'"))),
            );
            return;
        };

        match self.facade.load_model(target, self.offline).await {
            Ok(actual) => {
                self.monitor.notify_upgrade_applied(actual);
                let fallback_occurred = actual != target;
                if fallback_occurred {
                    self.output.send(Outbound::event(
                        "upgrade_fallback",
                        json!({"requested_model": target, "new_model": actual}),
                    ));
                } else {
                    self.output
                        .send(Outbound::event("upgrade_success", json!({"new_model": actual})));
                }
                self.output.send(Outbound::response(
                    id,
                    json!({
                        "success": !fallback_occurred,
                        "new_model": actual,
                        "requested_model": target,
                        "fallback_occurred": fallback_occurred,
                    }),
                ));
            }
            Err(e) => self.emit_error(Some(id), &SidecarError::Stt(e)),
        }
    }

    fn emit_error(&self, id: Option<String>, err: &SidecarError) {
        let code = error_code_for(err);
        tracing::warn!(target: "sidecar::ipc", error_code = code, error = %err, "request failed");
        self.output.send(Outbound::error(id, code, err.to_string(), err.is_recoverable()));
    }
}

fn extract_audio_data(params: &Value) -> Result<Vec<u8>, SidecarError> {
    let array = params
        .get("audio_data")
        .and_then(Value::as_array)
        .ok_or_else(|| SidecarError::Protocol(ProtocolError::MissingParameter("audio_data".to_string())))?;

    array
        .iter()
        .map(|v| {
            v.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| SidecarError::Audio(AudioError::InvalidAudio))
        })
        .collect()
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sidecar_foundation::error::SttError;
    use sidecar_resource_monitor::MonitorCallbacks;
    use sidecar_stt::backend::SttBackend;
    use sidecar_stt::types::Transcription;

    struct FakeBackend;

    #[async_trait]
    impl SttBackend for FakeBackend {
        async fn load_model(&mut self, target: ModelSize, _offline: bool) -> Result<ModelSize, SttError> {
            Ok(target)
        }

        async fn transcribe(&mut self, _pcm: &[u8], is_final: bool) -> Result<Transcription, SttError> {
            Ok(Transcription {
                text: "hi".to_string(),
                is_final,
                confidence: 0.9,
                language: "ja".to_string(),
                processing_time_ms: 1,
                model_size: ModelSize::Base,
            })
        }

        fn current_model(&self) -> Option<ModelSize> {
            Some(ModelSize::Base)
        }
    }

    struct NoopCallbacks;

    #[async_trait]
    impl MonitorCallbacks for NoopCallbacks {
        async fn on_downgrade(&self, _old: ModelSize, new: ModelSize) -> Option<ModelSize> {
            Some(new)
        }
        async fn on_upgrade_proposal(&self, _current: ModelSize, _proposed: ModelSize) {}
        async fn on_pause_recording(&self) {}
    }

    fn dispatcher() -> (Dispatcher, tokio::task::JoinHandle<()>) {
        let (output, writer) = crate::ipc::spawn_writer();
        let facade = Arc::new(SttFacade::new(Box::new(FakeBackend), ModelSize::Base));
        let (monitor, _task) = sidecar_resource_monitor::spawn(
            ModelSize::Base,
            std::time::Duration::from_secs(3600),
            Arc::new(NoopCallbacks),
            ShutdownHandle::new(),
        );
        let dispatcher = Dispatcher::new(output, facade, monitor, ShutdownHandle::new(), true);
        (dispatcher, writer)
    }

    #[tokio::test]
    async fn unknown_method_yields_unknown_method_error() {
        let (dispatcher, _writer) = dispatcher();
        dispatcher
            .handle_line(r#"{"type":"request","id":"1","method":"nonsense"}"#)
            .await;
    }

    #[tokio::test]
    async fn missing_id_on_request_is_reported_without_one() {
        let (dispatcher, _writer) = dispatcher();
        dispatcher.handle_line(r#"{"type":"request","method":"ping"}"#).await;
    }

    #[tokio::test]
    async fn ping_is_handled() {
        let (dispatcher, _writer) = dispatcher();
        dispatcher.handle_line(r#"{"type":"ping","id":"42"}"#).await;
    }

    #[tokio::test]
    async fn process_audio_with_empty_buffer_is_invalid_audio() {
        let (dispatcher, _writer) = dispatcher();
        dispatcher
            .handle_line(r#"{"type":"request","id":"9","method":"process_audio","params":{"audio_data":[]}}"#)
            .await;
    }

    #[tokio::test]
    async fn process_audio_with_samples_returns_a_response() {
        let (dispatcher, _writer) = dispatcher();
        dispatcher
            .handle_line(r#"{"type":"request","id":"10","method":"process_audio","params":{"audio_data":[0,0,1,1]}}"#)
            .await;
    }
}
