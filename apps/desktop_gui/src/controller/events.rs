//! Events flowing from the backend worker to the UI thread.

use client_core::{InputSummary, NoticeKind, ResultMetadata};

use crate::media::PreviewImage;

pub enum UiEvent {
    /// The worker runtime and removal client are up.
    WorkerReady,
    /// Unrecoverable startup failure (runtime or configuration); shown as a
    /// persistent banner.
    Fatal { message: String },
    /// A new input was accepted. `image` is `None` when the bytes could not
    /// be decoded for display; the selection itself still stands.
    SourcePreviewLoaded {
        summary: InputSummary,
        image: Option<PreviewImage>,
    },
    /// Processing finished successfully.
    ResultPreviewLoaded {
        metadata: ResultMetadata,
        image: Option<PreviewImage>,
    },
    /// Processing failed; the session is back in its previewing-equivalent
    /// state.
    ProcessingFailed { message: String },
    ControlsChanged {
        process_enabled: bool,
        download_enabled: bool,
    },
    SessionCleared,
    Toast { kind: NoticeKind, message: String },
}
