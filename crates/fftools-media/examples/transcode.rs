//! Run an ffmpeg conversion with live progress output.
//!
//! Usage: cargo run --example transcode -- -i input.mp4 -c:v libx264 output.mp4
//!
//! Ctrl-C cancels the run and kills the ffmpeg process.

use anyhow::Result;
use tokio::sync::watch;

use fftools_media::FfmpegSession;
use fftools_models::Priority;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let parameters = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if parameters.is_empty() {
        anyhow::bail!("usage: transcode <ffmpeg arguments>");
    }

    let session = FfmpegSession::new()
        .multi_thread(true)
        .priority(Priority::BelowNormal);

    let mut progress = session.subscribe_progress();
    tokio::spawn(async move {
        while let Ok(p) = progress.recv().await {
            println!(
                "frame {:>6}  time {:>9}ms  speed {:>6}",
                p.frame.unwrap_or(0),
                p.out_time_ms,
                p.speed
                    .map(|s| format!("{s:.2}x"))
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
    });

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let result = session.run(&parameters, cancel_rx).await?;
    println!(
        "done in {}s: ffmpeg {}",
        result.duration().num_seconds(),
        result.arguments
    );
    Ok(())
}
