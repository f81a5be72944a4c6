//! Backend worker: owns the session controller on a tokio runtime and
//! services the UI command queue.

use std::{sync::Arc, thread};

use client_core::{
    config, download_file_name_now, NoticeKind, RemovalApi, SessionController, SessionEvent,
};
use crossbeam_channel::{Receiver, Sender};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::UiEvent;
use crate::media;

pub fn launch(cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Fatal {
                    message: format!("failed to build backend runtime: {err}"),
                });
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let settings = config::load_settings();
            let api = match RemovalApi::from_settings(&settings) {
                Ok(api) => api,
                Err(err) => {
                    let _ = ui_tx.try_send(UiEvent::Fatal {
                        message: err.to_string(),
                    });
                    tracing::error!("backend worker startup failure: {err}");
                    return;
                }
            };
            let controller = SessionController::new(Arc::new(api));
            let _ = ui_tx.try_send(UiEvent::WorkerReady);

            // Forward controller view intents and notices to the UI thread.
            // Preview payloads are decoded and forwarded by the command loop
            // below instead, since they need the raw bytes.
            let mut events = controller.subscribe_events();
            let ui_tx_events = ui_tx.clone();
            tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    let forwarded = match event {
                        SessionEvent::Notice { kind, message } => {
                            Some(UiEvent::Toast { kind, message })
                        }
                        SessionEvent::ControlsChanged {
                            process_enabled,
                            download_enabled,
                        } => Some(UiEvent::ControlsChanged {
                            process_enabled,
                            download_enabled,
                        }),
                        SessionEvent::ProcessingFailed { message } => {
                            Some(UiEvent::ProcessingFailed { message })
                        }
                        SessionEvent::SessionReset => Some(UiEvent::SessionCleared),
                        SessionEvent::PreviewReady { .. } | SessionEvent::ResultReady { .. } => None,
                    };
                    if let Some(event) = forwarded {
                        let _ = ui_tx_events.try_send(event);
                    }
                }
            });

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    BackendCommand::SelectFile { path } => {
                        tracing::info!(path = %path.display(), "backend: select_file");
                        let bytes = match tokio::fs::read(&path).await {
                            Ok(bytes) => bytes,
                            Err(err) => {
                                let _ = ui_tx.try_send(UiEvent::Toast {
                                    kind: NoticeKind::Error,
                                    message: format!("Failed to read file: {err}"),
                                });
                                continue;
                            }
                        };
                        let file_name = path
                            .file_name()
                            .and_then(|name| name.to_str())
                            .unwrap_or("upload.bin")
                            .to_string();
                        let media_type = mime_guess::from_path(&path)
                            .first_raw()
                            .unwrap_or("application/octet-stream")
                            .to_string();

                        if controller
                            .select_candidate(file_name, media_type, bytes.clone())
                            .await
                        {
                            let snapshot = controller.snapshot().await;
                            if let Some(summary) = snapshot.input {
                                let image = match media::decode_preview_image(&bytes) {
                                    Ok(image) => Some(image),
                                    Err(err) => {
                                        tracing::warn!("source preview decode failed: {err}");
                                        None
                                    }
                                };
                                let _ = ui_tx
                                    .try_send(UiEvent::SourcePreviewLoaded { summary, image });
                            }
                        }
                    }
                    BackendCommand::Process => {
                        if controller.process().await {
                            let snapshot = controller.snapshot().await;
                            if let (Some(metadata), Some(bytes)) =
                                (snapshot.result, controller.result_bytes().await)
                            {
                                let image = match media::decode_preview_image(&bytes) {
                                    Ok(image) => Some(image),
                                    Err(err) => {
                                        tracing::warn!("result preview decode failed: {err}");
                                        None
                                    }
                                };
                                let _ = ui_tx
                                    .try_send(UiEvent::ResultPreviewLoaded { metadata, image });
                            }
                        }
                    }
                    BackendCommand::Download => {
                        let Some(bytes) = controller.result_bytes().await else {
                            continue;
                        };
                        let mut dialog =
                            rfd::FileDialog::new().set_file_name(download_file_name_now());
                        if let Some(dir) = dirs::download_dir() {
                            dialog = dialog.set_directory(dir);
                        }
                        let Some(path) = dialog.save_file() else {
                            continue;
                        };
                        match tokio::fs::write(&path, bytes).await {
                            Ok(()) => {
                                tracing::info!(path = %path.display(), "backend: result saved");
                                let _ = ui_tx.try_send(UiEvent::Toast {
                                    kind: NoticeKind::Success,
                                    message: client_core::MSG_DOWNLOAD_SUCCESS.to_string(),
                                });
                            }
                            Err(err) => {
                                let _ = ui_tx.try_send(UiEvent::Toast {
                                    kind: NoticeKind::Error,
                                    message: format!("Failed to save image: {err}"),
                                });
                            }
                        }
                    }
                    BackendCommand::Reset => {
                        controller.reset().await;
                    }
                }
            }
        });
    });
}
