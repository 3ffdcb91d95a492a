//! `larvacut` binary: cut one video into per-larva clips.

mod cli;
mod logging;
mod progress;

use std::io::IsTerminal;
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use indicatif::ProgressBar;
use tokio::sync::watch;
use tracing::{error, info, warn};

use larvacut_media::{
    default_detector, open_source, CutReport, LaplacianVariance, MovieCutter, OpenCvClipSink,
    TracingProgress,
};
use larvacut_models::CutterConfig;

use crate::cli::CliArgs;
use crate::progress::BarProgress;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    logging::init();

    let args = CliArgs::parse();
    if let Err(e) = run(args).await {
        error!("Cut failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = args.apply_to(CutterConfig::from_env());
    config.validate().context("invalid cutter configuration")?;
    info!(video = %args.video.display(), "Cutter config: {}", config);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, finishing open clips");
            cancel_tx.send_replace(true);
        }
    });

    // The bar only draws on a terminal; redirected runs log progress instead.
    let mut cutter = MovieCutter::new(config, args.output_dir.clone()).with_cancel(cancel_rx);
    let bar = if std::io::stderr().is_terminal() {
        let observer = BarProgress::new(ProgressBar::new_spinner());
        let bar = observer.bar().clone();
        cutter = cutter.with_progress(observer);
        Some(bar)
    } else {
        cutter = cutter.with_progress(TracingProgress::default());
        None
    };

    let video = args.video.clone();
    let result = tokio::task::spawn_blocking(move || cut(&video, &cutter))
        .await
        .context("cutting task panicked")?;

    if let Some(bar) = bar {
        bar.finish();
    }
    let report = result?;

    if report.cancelled {
        warn!(output_dir = %report.output_dir.display(), "Cut interrupted, partial output kept");
    }
    if args.report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn cut(video: &Path, cutter: &MovieCutter) -> anyhow::Result<CutReport> {
    let config = cutter.config();
    let mut source =
        open_source(video).with_context(|| format!("failed to open {}", video.display()))?;
    let history = config.training_frames(source.info().total_frames);
    let mut detector = default_detector(config, history).context("failed to build detector")?;

    let report = cutter
        .run(
            video,
            source.as_mut(),
            &mut detector,
            Box::new(LaplacianVariance),
            Box::new(OpenCvClipSink),
        )
        .with_context(|| format!("failed to cut {}", video.display()))?;
    Ok(report)
}
