//! Video generation worker binary.
//!
//! Usage: `vgen-worker <job.json>`

use anyhow::Context;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use vgen_client::{ClientConfig, VideoGenerator};
use vgen_media::{FfmpegCodec, MediaCodec};
use vgen_storage::LocalStore;
use vgen_worker::{init_tracing, JobReport, JobSpec};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    let job_path = std::env::args()
        .nth(1)
        .context("usage: vgen-worker <job.json>")?;

    info!("Starting vgen-worker");

    let config = ClientConfig::from_env();
    info!("Client config: {:?}", config);

    if let Err(e) = vgen_media::check_ffmpeg().and_then(|_| vgen_media::check_ffprobe()) {
        warn!(error = %e, "FFmpeg tools missing, decoding results will fail");
    }

    let job = JobSpec::load(&job_path).await?;
    let store = LocalStore::new(&config.output_dir).with_input_root(&config.input_dir);
    let input = job.to_input(&store)?;

    let (cancel_tx, cancel_rx) = watch::channel(false);

    // Ctrl-C also kills an FFmpeg decode or export that is already running.
    let codec: Arc<dyn MediaCodec> = Arc::new(FfmpegCodec::new().with_cancel(cancel_rx.clone()));
    let generator = Arc::new(VideoGenerator::new(config.clone(), Arc::clone(&codec)));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, cancelling generation");
            cancel_tx.send(true).ok();
        }
    });

    let output = match generator.spawn(input, cancel_rx).await? {
        Ok(output) => output,
        Err(e) => {
            error!(kind = e.kind(), "Generation failed: {}", e);
            return Err(e.into());
        }
    };

    let saved_to = match &job.save_to {
        Some(dest) => Some(output.video.save_to(dest).await?),
        None => None,
    };

    let exported = match &job.export {
        Some(export) => Some(
            export
                .run(codec.as_ref(), &config.output_dir, output.video.frames())
                .await?,
        ),
        None => None,
    };

    let report = JobReport {
        summary: output.summary(),
        saved_to,
        exported,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("Worker finished");
    Ok(())
}
