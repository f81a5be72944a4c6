use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use shared::domain::{ImageFormat, MAX_UPLOAD_BYTES};
use tokio::sync::{broadcast, oneshot, Mutex};

use crate::{
    download_file_name, BackgroundRemover, NoticeKind, RemovalError, SelectedInput,
    SessionController, SessionEvent, SessionPhase, MSG_REMOVAL_SUCCESS,
};

/// Removal double that replies with a fixed outcome and counts calls.
struct StaticRemover {
    reply: Result<Vec<u8>, (u16, String)>,
    calls: AtomicUsize,
}

impl StaticRemover {
    fn ok(bytes: Vec<u8>) -> Self {
        Self {
            reply: Ok(bytes),
            calls: AtomicUsize::new(0),
        }
    }

    fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self {
            reply: Err((status, message.into())),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackgroundRemover for StaticRemover {
    async fn remove_background(&self, _input: &SelectedInput) -> Result<Vec<u8>, RemovalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(bytes) => Ok(bytes.clone()),
            Err((status, message)) => Err(RemovalError::Api {
                status: *status,
                message: message.clone(),
            }),
        }
    }
}

/// Removal double that blocks until the test releases it.
struct GatedRemover {
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    reply: Vec<u8>,
}

impl GatedRemover {
    fn new(reply: Vec<u8>) -> (Self, oneshot::Sender<()>) {
        let (release_tx, release_rx) = oneshot::channel();
        (
            Self {
                gate: Mutex::new(Some(release_rx)),
                reply,
            },
            release_tx,
        )
    }
}

#[async_trait]
impl BackgroundRemover for GatedRemover {
    async fn remove_background(&self, _input: &SelectedInput) -> Result<Vec<u8>, RemovalError> {
        let gate = self.gate.lock().await.take().expect("single use gate");
        let _ = gate.await;
        Ok(self.reply.clone())
    }
}

fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let pixels = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
    let mut bytes = Vec::new();
    pixels
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .expect("encode png");
    bytes
}

fn drain_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn notices(events: &[SessionEvent]) -> Vec<(NoticeKind, String)> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Notice { kind, message } => Some((*kind, message.clone())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn rejects_unsupported_media_type_without_state_change() {
    let controller = SessionController::new(Arc::new(StaticRemover::ok(Vec::new())));
    let mut rx = controller.subscribe_events();

    let accepted = controller
        .select_candidate("notes.pdf", "application/pdf", vec![0u8; 64])
        .await;

    assert!(!accepted);
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::Idle);
    assert!(snapshot.input.is_none());
    assert_eq!(
        notices(&drain_events(&mut rx)),
        vec![(
            NoticeKind::Error,
            "Please select a JPG, PNG, or WEBP image".to_string()
        )]
    );
}

#[tokio::test]
async fn rejects_oversized_file_even_with_supported_type() {
    let controller = SessionController::new(Arc::new(StaticRemover::ok(Vec::new())));
    let mut rx = controller.subscribe_events();

    let accepted = controller
        .select_candidate(
            "huge.png",
            "image/png",
            vec![0u8; (MAX_UPLOAD_BYTES + 1) as usize],
        )
        .await;

    assert!(!accepted);
    assert_eq!(controller.phase().await, SessionPhase::Idle);
    assert_eq!(
        notices(&drain_events(&mut rx)),
        vec![(
            NoticeKind::Error,
            "File size must be less than 5MB".to_string()
        )]
    );
}

#[tokio::test]
async fn rejection_keeps_the_previous_selection() {
    let controller = SessionController::new(Arc::new(StaticRemover::ok(Vec::new())));

    assert!(
        controller
            .select_candidate("first.png", "image/png", vec![1u8; 10])
            .await
    );
    assert!(
        !controller
            .select_candidate("second.gif", "image/gif", vec![2u8; 10])
            .await
    );

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::Previewing);
    assert_eq!(snapshot.input.expect("input").file_name, "first.png");
}

#[tokio::test]
async fn valid_selection_enters_previewing_with_process_enabled() {
    let controller = SessionController::new(Arc::new(StaticRemover::ok(Vec::new())));
    let mut rx = controller.subscribe_events();

    let accepted = controller
        .select_candidate("photo.png", "image/png", vec![0u8; 2 * 1024 * 1024])
        .await;

    assert!(accepted);
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::Previewing);
    let input = snapshot.input.expect("input");
    assert_eq!(input.file_name, "photo.png");
    assert_eq!(input.format, ImageFormat::Png);
    assert_eq!(input.byte_len, 2 * 1024 * 1024);
    assert!(snapshot.result.is_none());

    let events = drain_events(&mut rx);
    assert!(events
        .iter()
        .any(|event| matches!(event, SessionEvent::PreviewReady { .. })));
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::ControlsChanged {
            process_enabled: true,
            download_enabled: false,
        }
    )));
}

#[tokio::test]
async fn process_without_selection_is_a_silent_no_op() {
    let remover = Arc::new(StaticRemover::ok(sample_png(2, 2)));
    let controller = SessionController::new(Arc::clone(&remover) as Arc<dyn BackgroundRemover>);
    let mut rx = controller.subscribe_events();

    assert!(!controller.process().await);

    assert_eq!(remover.call_count(), 0);
    assert_eq!(controller.phase().await, SessionPhase::Idle);
    assert!(drain_events(&mut rx).is_empty());
}

#[tokio::test]
async fn successful_processing_reaches_result_with_metadata_and_notice() {
    let reply = sample_png(3, 2);
    let reply_len = reply.len() as u64;
    let controller = SessionController::new(Arc::new(StaticRemover::ok(reply)));
    let mut rx = controller.subscribe_events();

    assert!(
        controller
            .select_candidate("photo.png", "image/png", vec![0u8; 2 * 1024 * 1024])
            .await
    );
    assert!(controller.process().await);

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::Result);
    let metadata = snapshot.result.expect("result metadata");
    assert_eq!(metadata.dimensions, Some((3, 2)));
    assert_eq!(metadata.byte_len, reply_len);
    assert_eq!(metadata.format_label, "PNG");
    assert!(controller.result_bytes().await.is_some());

    let events = drain_events(&mut rx);
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::ControlsChanged {
            process_enabled: true,
            download_enabled: true,
        }
    )));
    assert!(notices(&events)
        .iter()
        .any(|(kind, message)| *kind == NoticeKind::Success && message == MSG_REMOVAL_SUCCESS));
}

#[tokio::test]
async fn api_failure_returns_to_an_interactive_error_state() {
    let controller = SessionController::new(Arc::new(StaticRemover::api_error(400, "Invalid image")));
    let mut rx = controller.subscribe_events();

    assert!(
        controller
            .select_candidate("photo.jpg", "image/jpeg", vec![0u8; 1024])
            .await
    );
    assert!(!controller.process().await);

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::Error);
    assert_eq!(snapshot.input.expect("input kept").file_name, "photo.jpg");
    assert!(snapshot.result.is_none());
    assert!(controller.result_bytes().await.is_none());

    let events = drain_events(&mut rx);
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::ProcessingFailed { message } if message == "Invalid image"
    )));
    // Previewing-equivalent: the trigger comes back, download stays off.
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::ControlsChanged {
            process_enabled: true,
            download_enabled: false,
        }
    )));
    assert!(notices(&events)
        .iter()
        .any(|(kind, message)| *kind == NoticeKind::Error && message == "Invalid image"));
}

#[tokio::test]
async fn reprocessing_after_a_failure_is_allowed() {
    let controller = SessionController::new(Arc::new(StaticRemover::api_error(429, "Rate limit exceeded")));

    assert!(
        controller
            .select_candidate("photo.png", "image/png", vec![0u8; 1024])
            .await
    );
    assert!(!controller.process().await);
    assert_eq!(controller.phase().await, SessionPhase::Error);

    // The failed state is not a dead end; the same input can be retried.
    assert!(!controller.process().await);
    assert_eq!(controller.phase().await, SessionPhase::Error);
}

#[tokio::test]
async fn undecodable_result_still_supports_download() {
    let controller = SessionController::new(Arc::new(StaticRemover::ok(b"not a png".to_vec())));

    assert!(
        controller
            .select_candidate("photo.png", "image/png", vec![0u8; 1024])
            .await
    );
    assert!(controller.process().await);

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::Result);
    let metadata = snapshot.result.expect("metadata");
    assert_eq!(metadata.dimensions, None);
    assert_eq!(metadata.byte_len, b"not a png".len() as u64);
    assert_eq!(
        controller.result_bytes().await.as_deref(),
        Some(b"not a png".as_slice())
    );
}

#[tokio::test]
async fn reset_is_idempotent() {
    let controller = SessionController::new(Arc::new(StaticRemover::ok(sample_png(2, 2))));

    assert!(
        controller
            .select_candidate("photo.png", "image/png", vec![0u8; 1024])
            .await
    );
    assert!(controller.process().await);

    controller.reset().await;
    let first = controller.snapshot().await;
    controller.reset().await;
    let second = controller.snapshot().await;

    assert_eq!(first.phase, SessionPhase::Idle);
    assert!(first.input.is_none());
    assert!(first.result.is_none());
    assert_eq!(first, second);
    assert!(controller.result_bytes().await.is_none());
}

#[tokio::test]
async fn replacing_the_selection_retains_only_the_latest_input() {
    let controller = SessionController::new(Arc::new(StaticRemover::ok(Vec::new())));

    assert!(
        controller
            .select_candidate("a.png", "image/png", vec![1u8; 10])
            .await
    );
    assert!(
        controller
            .select_candidate("b.jpg", "image/jpeg", vec![2u8; 20])
            .await
    );

    let snapshot = controller.snapshot().await;
    let input = snapshot.input.expect("input");
    assert_eq!(input.file_name, "b.jpg");
    assert_eq!(input.byte_len, 20);
    assert_eq!(input.format, ImageFormat::Jpeg);
}

#[tokio::test]
async fn new_selection_releases_the_previous_result() {
    let controller = SessionController::new(Arc::new(StaticRemover::ok(sample_png(2, 2))));

    assert!(
        controller
            .select_candidate("a.png", "image/png", vec![0u8; 1024])
            .await
    );
    assert!(controller.process().await);
    assert!(controller.result_bytes().await.is_some());

    assert!(
        controller
            .select_candidate("b.png", "image/png", vec![0u8; 1024])
            .await
    );

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::Previewing);
    assert!(snapshot.result.is_none());
    assert!(controller.result_bytes().await.is_none());
}

#[tokio::test]
async fn completion_after_reset_is_discarded() {
    let (remover, release) = GatedRemover::new(sample_png(2, 2));
    let controller = SessionController::new(Arc::new(remover));

    assert!(
        controller
            .select_candidate("photo.png", "image/png", vec![0u8; 1024])
            .await
    );

    let processing = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.process().await })
    };
    // Let the request reach the gated remover before resetting.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    controller.reset().await;
    release.send(()).expect("release gate");

    assert!(!processing.await.expect("join"));
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::Idle);
    assert!(snapshot.input.is_none());
    assert!(snapshot.result.is_none());
}

#[test]
fn download_names_are_timestamped_png_files() {
    assert_eq!(
        download_file_name(1_700_000_000_123),
        "background-removed-1700000000123.png"
    );
}
