use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{
    config, download_file_name_now, NoticeKind, RemovalApi, SessionController, SessionEvent,
};
use shared::domain::format_size_mib;

/// Remove the background from an image via the configured removal service.
#[derive(Parser, Debug)]
#[command(name = "desktop")]
struct Args {
    /// Image to process (JPEG, PNG, or WEBP, at most 5 MiB).
    #[arg(long)]
    input: PathBuf,

    /// Where to write the resulting PNG. Defaults to a timestamped name in
    /// the current directory.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Settings file to read instead of ./cutout.toml.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => config::load_settings_from(path),
        None => config::load_settings(),
    };
    let api = RemovalApi::from_settings(&settings)?;
    let controller = SessionController::new(Arc::new(api));

    let mut events = controller.subscribe_events();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SessionEvent::Notice { kind, message } = event {
                match kind {
                    NoticeKind::Success => println!("{message}"),
                    NoticeKind::Error => eprintln!("{message}"),
                }
            }
        }
    });

    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("failed to read input file '{}'", args.input.display()))?;
    let file_name = args
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.bin")
        .to_string();
    let media_type = mime_guess::from_path(&args.input)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string();

    if !controller.select_candidate(file_name, media_type, bytes).await {
        bail!("input file was rejected");
    }
    if !controller.process().await {
        bail!("background removal did not complete");
    }

    let snapshot = controller.snapshot().await;
    if let Some(metadata) = &snapshot.result {
        let dimensions = metadata
            .dimensions
            .map(|(w, h)| format!("{w} x {h}"))
            .unwrap_or_else(|| "unknown dimensions".to_string());
        println!(
            "Result: {dimensions}, {}, {}",
            format_size_mib(metadata.byte_len),
            metadata.format_label
        );
    }

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(download_file_name_now()));
    let result = controller
        .result_bytes()
        .await
        .context("no result available after processing")?;
    tokio::fs::write(&output, result)
        .await
        .with_context(|| format!("failed to write '{}'", output.display()))?;
    println!("Saved {}", output.display());

    printer.abort();
    Ok(())
}
