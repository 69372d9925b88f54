//! Replays scripted head motion through the capture and gesture engine.

use anyhow::{Context, Result};
use clap::Parser;
use head_pose_capture::{
    app::HeadPoseApp,
    capture::{CaptureSet, ChannelSink},
    config::{Config, EXAMPLE_CONFIG},
    script::PoseScript,
    snapshot::ImageFrameSource,
    synthetic::SyntheticFace,
};
use image::{Rgb, RgbImage};
use log::{info, warn};
use std::path::PathBuf;

/// Simulated camera resolution
const FRAME_WIDTH: u32 = 320;
const FRAME_HEIGHT: u32 = 240;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Pose script to replay (YAML list of segments); defaults to a full capture sequence
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Simulated camera frame rate
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Disable gesture detection
    #[arg(long)]
    no_gestures: bool,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).unwrap_or_else(|e| {
                warn!("Failed to load config file: {e}. Using defaults.");
                Config::default()
            })
        }
        None => Config::default(),
    };
    if args.no_gestures {
        config.gesture.enabled = false;
    }

    let script = match &args.script {
        Some(path) => PoseScript::from_file(path).with_context(|| format!("loading script {}", path.display()))?,
        None => PoseScript::capture_sequence(3000),
    };
    info!(
        "Replaying {} segments ({:.1} s) at {} fps",
        script.segments().len(),
        script.total_duration().as_secs_f64(),
        args.fps
    );

    let (sink, uploads) = ChannelSink::new();
    let mut app = HeadPoseApp::new(&config)
        .context("invalid configuration")?
        .with_sink(Box::new(sink));
    app.events().subscribe(|event| {
        info!("Gesture event: {} (confidence {:.2})", event.kind, event.confidence);
        Ok(())
    });

    let face = SyntheticFace::new((0.5, 0.42), 0.25, f64::from(FRAME_WIDTH) / f64::from(FRAME_HEIGHT))?;
    let mut source = ImageFrameSource::new();

    app.camera_started();
    app.start_session()?;

    let mut last_status = None;
    for (index, frame) in script.frames(face, args.fps).enumerate() {
        source.push(camera_image(index));
        let report = app.process_frame(&frame, &mut source);

        if last_status != Some((report.state, report.status)) {
            info!(
                "[{:>6} ms] {} {:?} ({:?})",
                report.timestamp.as_millis(),
                report.state,
                report.status,
                report.guidance
            );
            last_status = Some((report.state, report.status));
        }
        if let Some(direction) = report.captured {
            info!("[{:>6} ms] {direction} captured", report.timestamp.as_millis());
        }
    }

    match uploads.try_recv() {
        Ok(captures) => print_summary(&captures),
        Err(_) => {
            println!(
                "Session ended in {} with {} of 5 directions captured",
                app.state(),
                app.captures().len()
            );
        }
    }

    Ok(())
}

/// Stand-in camera image; varies per frame so snapshots differ
fn camera_image(index: usize) -> RgbImage {
    #[allow(clippy::cast_possible_truncation)]
    let shade = (index % 256) as u8;
    RgbImage::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
        #[allow(clippy::cast_possible_truncation)]
        Rgb([(x % 256) as u8, (y % 256) as u8, shade])
    })
}

fn print_summary(captures: &CaptureSet) {
    println!("Capture session completed:");
    for record in captures.iter() {
        println!(
            "  {:<5} {:>7} bytes  {}  at {} ms",
            record.direction.as_str(),
            record.image_data.len(),
            record.format.mime_type(),
            record.timestamp.as_millis()
        );
    }
}
