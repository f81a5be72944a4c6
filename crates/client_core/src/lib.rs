use std::sync::Arc;

use async_trait::async_trait;
use image::GenericImageView;
use reqwest::Client;
use shared::{
    domain::{format_size_mib, validate_candidate, ImageFormat},
    protocol::{RemovalErrorBody, API_KEY_HEADER, IMAGE_FILE_FIELD, SIZE_AUTO, SIZE_FIELD},
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};
use url::Url;

pub mod config;
#[cfg(test)]
mod tests;

pub use config::{ConfigError, Settings};

/// Notification shown after a successful removal.
pub const MSG_REMOVAL_SUCCESS: &str = "Background removed successfully!";
/// Notification shown after the result was saved to disk.
pub const MSG_DOWNLOAD_SUCCESS: &str = "Image downloaded successfully!";
/// Fallback when a non-2xx response carries no readable error title.
pub const MSG_API_FALLBACK: &str = "API request failed";

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A validated upload: the user's bytes plus their declared identity.
#[derive(Debug, Clone)]
pub struct SelectedInput {
    pub file_name: String,
    pub media_type: String,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl SelectedInput {
    pub fn summary(&self) -> InputSummary {
        InputSummary {
            file_name: self.file_name.clone(),
            media_type: self.media_type.clone(),
            byte_len: self.bytes.len() as u64,
            format: self.format,
        }
    }
}

/// Byte-free description of the selected input, safe to hand to a display
/// layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSummary {
    pub file_name: String,
    pub media_type: String,
    pub byte_len: u64,
    pub format: ImageFormat,
}

impl InputSummary {
    pub fn size_text(&self) -> String {
        format_size_mib(self.byte_len)
    }
}

/// Display metadata derived from a removal result. Dimensions are absent when
/// the result bytes could not be decoded; that only degrades the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultMetadata {
    pub dimensions: Option<(u32, u32)>,
    pub byte_len: u64,
    pub format_label: &'static str,
}

impl ResultMetadata {
    pub fn size_text(&self) -> String {
        format_size_mib(self.byte_len)
    }
}

/// Owned handle to the most recent result. Dropping it releases the bytes;
/// the session never holds more than one.
#[derive(Debug)]
pub struct ResultHandle {
    bytes: Vec<u8>,
    metadata: ResultMetadata,
}

impl ResultHandle {
    fn new(bytes: Vec<u8>) -> Self {
        let dimensions = match image::load_from_memory(&bytes) {
            Ok(decoded) => Some(decoded.dimensions()),
            Err(err) => {
                warn!("result image decode failed; dimensions unavailable: {err}");
                None
            }
        };
        let metadata = ResultMetadata {
            dimensions,
            byte_len: bytes.len() as u64,
            format_label: "PNG",
        };
        Self { bytes, metadata }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Previewing,
    Processing,
    Result,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// View intents and notifications emitted by the session controller. The host
/// (GUI worker, CLI) renders these; the controller never touches presentation
/// state directly.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    PreviewReady {
        input: InputSummary,
    },
    ResultReady {
        metadata: ResultMetadata,
    },
    ProcessingFailed {
        message: String,
    },
    ControlsChanged {
        process_enabled: bool,
        download_enabled: bool,
    },
    Notice {
        kind: NoticeKind,
        message: String,
    },
    SessionReset,
}

/// Failures from the removal service call. `Display` is the user-facing
/// message.
#[derive(Debug, Error)]
pub enum RemovalError {
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Failed to remove background")]
    Transport(#[from] reqwest::Error),
}

/// Seam to the external removal service so hosts and tests can substitute
/// doubles.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn remove_background(&self, input: &SelectedInput) -> Result<Vec<u8>, RemovalError>;
}

/// HTTP client for the real removal endpoint.
pub struct RemovalApi {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl RemovalApi {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let endpoint = settings.validated_api_url()?;
        Ok(Self {
            http: Client::new(),
            endpoint,
            api_key: settings.api_key.trim().to_string(),
        })
    }
}

#[async_trait]
impl BackgroundRemover for RemovalApi {
    async fn remove_background(&self, input: &SelectedInput) -> Result<Vec<u8>, RemovalError> {
        let part = reqwest::multipart::Part::bytes(input.bytes.clone())
            .file_name(input.file_name.clone())
            .mime_str(&input.media_type)?;
        let form = reqwest::multipart::Form::new()
            .part(IMAGE_FILE_FIELD, part)
            .text(SIZE_FIELD, SIZE_AUTO);

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let message = serde_json::from_slice::<RemovalErrorBody>(&body)
                .ok()
                .and_then(|body| body.primary_title().map(str::to_string))
                .unwrap_or_else(|| MSG_API_FALLBACK.to_string());
            return Err(RemovalError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Point-in-time view of the session for hosts and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub input: Option<InputSummary>,
    pub result: Option<ResultMetadata>,
}

struct SessionState {
    selected: Option<Arc<SelectedInput>>,
    result: Option<ResultHandle>,
    in_flight: bool,
    phase: SessionPhase,
    /// Bumped on every selection and reset; a completion whose captured
    /// generation no longer matches is discarded.
    generation: u64,
}

impl SessionState {
    fn empty() -> Self {
        Self {
            selected: None,
            result: None,
            in_flight: false,
            phase: SessionPhase::Idle,
            generation: 0,
        }
    }
}

/// Owns the one piece of mutable state and drives the linear lifecycle
/// idle -> previewing -> processing -> result | error. All outcomes, including
/// every error, surface as [`SessionEvent`]s; nothing propagates past the
/// controller boundary.
pub struct SessionController {
    remover: Arc<dyn BackgroundRemover>,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(remover: Arc<dyn BackgroundRemover>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            remover,
            inner: Mutex::new(SessionState::empty()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Validates and stores a candidate upload. Returns `false` (with an error
    /// notice and no state change) when the candidate is rejected. A prior
    /// result is released before the new input becomes visible.
    pub async fn select_candidate(
        &self,
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> bool {
        let file_name = file_name.into();
        let media_type = media_type.into();

        let format = match validate_candidate(&media_type, bytes.len() as u64) {
            Ok(format) => format,
            Err(err) => {
                warn!(
                    file = %file_name,
                    media_type = %media_type,
                    byte_len = bytes.len(),
                    "session: candidate rejected: {err:?}"
                );
                self.notify(NoticeKind::Error, err.to_string());
                return false;
            }
        };

        let input = Arc::new(SelectedInput {
            file_name,
            media_type,
            format,
            bytes,
        });
        let summary = input.summary();

        let process_enabled = {
            let mut guard = self.inner.lock().await;
            guard.result = None;
            guard.selected = Some(input);
            guard.phase = SessionPhase::Previewing;
            guard.generation = guard.generation.wrapping_add(1);
            !guard.in_flight
        };

        info!(
            file = %summary.file_name,
            byte_len = summary.byte_len,
            "session: input selected"
        );
        let _ = self.events.send(SessionEvent::PreviewReady { input: summary });
        let _ = self.events.send(SessionEvent::ControlsChanged {
            process_enabled,
            download_enabled: false,
        });
        true
    }

    /// Runs one removal request for the selected input. A missing selection or
    /// an already in-flight request makes this a silent no-op. Returns `true`
    /// only when the session reached [`SessionPhase::Result`].
    pub async fn process(&self) -> bool {
        let (input, generation) = {
            let mut guard = self.inner.lock().await;
            let Some(input) = guard.selected.clone() else {
                return false;
            };
            if guard.in_flight {
                return false;
            }
            guard.in_flight = true;
            guard.phase = SessionPhase::Processing;
            (input, guard.generation)
        };

        let _ = self.events.send(SessionEvent::ControlsChanged {
            process_enabled: false,
            download_enabled: false,
        });
        info!(
            file = %input.file_name,
            byte_len = input.bytes.len(),
            "session: processing started"
        );

        let outcome = self.remover.remove_background(&input).await;

        let mut guard = self.inner.lock().await;
        guard.in_flight = false;

        if guard.generation != generation {
            // The session was reset or re-seeded while the request was in
            // flight; the completion no longer has a home.
            info!("session: discarding completion for a superseded request");
            drop(guard);
            return false;
        }

        match outcome {
            Ok(bytes) => {
                let handle = ResultHandle::new(bytes);
                let metadata = handle.metadata().clone();
                guard.result.take();
                guard.result = Some(handle);
                guard.phase = SessionPhase::Result;
                drop(guard);

                info!(
                    byte_len = metadata.byte_len,
                    "session: processing succeeded"
                );
                let _ = self.events.send(SessionEvent::ResultReady { metadata });
                let _ = self.events.send(SessionEvent::ControlsChanged {
                    process_enabled: true,
                    download_enabled: true,
                });
                self.notify(NoticeKind::Success, MSG_REMOVAL_SUCCESS);
                true
            }
            Err(err) => {
                // Previewing-equivalent: the source stays visible and the
                // trigger is re-enabled, never a dead end.
                guard.phase = SessionPhase::Error;
                drop(guard);

                let message = err.to_string();
                error!("session: processing failed: {err}");
                let _ = self.events.send(SessionEvent::ProcessingFailed {
                    message: message.clone(),
                });
                let _ = self.events.send(SessionEvent::ControlsChanged {
                    process_enabled: true,
                    download_enabled: false,
                });
                self.notify(NoticeKind::Error, message);
                false
            }
        }
    }

    /// Releases both slots and returns to `Idle`. Idempotent.
    pub async fn reset(&self) {
        {
            let mut guard = self.inner.lock().await;
            guard.selected = None;
            guard.result = None;
            guard.phase = SessionPhase::Idle;
            guard.generation = guard.generation.wrapping_add(1);
        }
        info!("session: reset");
        let _ = self.events.send(SessionEvent::SessionReset);
        let _ = self.events.send(SessionEvent::ControlsChanged {
            process_enabled: false,
            download_enabled: false,
        });
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.phase
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let guard = self.inner.lock().await;
        SessionSnapshot {
            phase: guard.phase,
            input: guard.selected.as_deref().map(SelectedInput::summary),
            result: guard.result.as_ref().map(|handle| handle.metadata().clone()),
        }
    }

    /// Copy of the result bytes for saving, or `None` when there is nothing to
    /// download.
    pub async fn result_bytes(&self) -> Option<Vec<u8>> {
        let guard = self.inner.lock().await;
        guard.result.as_ref().map(|handle| handle.bytes().to_vec())
    }

    fn notify(&self, kind: NoticeKind, message: impl Into<String>) {
        let _ = self.events.send(SessionEvent::Notice {
            kind,
            message: message.into(),
        });
    }
}

/// File name for a downloaded result, stamped with the given unix-millis
/// timestamp.
pub fn download_file_name(unix_millis: i64) -> String {
    format!("background-removed-{unix_millis}.png")
}

pub fn download_file_name_now() -> String {
    download_file_name(chrono::Utc::now().timestamp_millis())
}
