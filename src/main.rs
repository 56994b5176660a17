//! Fishbowl headless runner
//!
//! Drives the simulation for a fixed number of frames and logs a JSON summary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use fishbowl::consts::{FEED_POLL_SECONDS, FEED_QUEUE_CAPACITY};
use fishbowl::intake::{
    AutoDrop, Detection, DropColor, FeedError, FeedSnapshot, FeedWorker, JsonFileSource, ScriptedSource, spawn_queue,
};
use fishbowl::{ColorTag, FrameDriver, PhysicsConfig, Simulation};

/// Fishbowl physics runner
#[derive(Parser, Debug)]
#[command(name = "fishbowl")]
#[command(about = "Drop circles into an elliptical bowl and report how full it gets", long_about = None)]
struct Args {
    /// JSON physics config (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for spawn placement and contact tie-breaks
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Frames to simulate
    #[arg(short, long, default_value = "1800")]
    frames: u64,

    /// Simulated frame rate
    #[arg(long, default_value = "60")]
    fps: f32,

    /// Bodies dropped per second by autodrop (0 = off)
    #[arg(short, long, default_value = "0")]
    autodrop: f32,

    /// Autodrop color: a palette name or "random"
    #[arg(long, default_value = "random")]
    color: String,

    /// Manual drops before the first frame
    #[arg(short, long, default_value = "0")]
    drops: u32,

    /// Shake the bowl at this frame
    #[arg(long)]
    shake_at: Option<u64>,

    /// Poll a detection snapshot JSON file and drop one body per new detection
    #[arg(long, conflicts_with = "feed_demo")]
    feed_file: Option<PathBuf>,

    /// Feed a short scripted detection sequence
    #[arg(long)]
    feed_demo: bool,

    /// Print the default config as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.dump_config {
        println!("{}", PhysicsConfig::default().to_json()?);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => PhysicsConfig::load(path)?,
        None => PhysicsConfig::default(),
    };
    config.validate()?;

    let color = match args.color.as_str() {
        "random" => DropColor::Random,
        name => DropColor::Fixed(ColorTag::parse(name).ok_or_else(|| format!("unknown color '{name}'"))?),
    };
    if !(args.fps.is_finite() && args.fps > 0.0) {
        return Err(format!("fps must be positive, got {}", args.fps).into());
    }
    let dt = 1.0 / args.fps;

    let (sender, queue) = spawn_queue(FEED_QUEUE_CAPACITY);
    let sim = Simulation::new(config, args.seed);
    let mut autodrop = AutoDrop::new(args.autodrop, color, args.seed.wrapping_add(1));
    autodrop.set_enabled(args.autodrop > 0.0);
    let mut driver = FrameDriver::new(sim, autodrop, queue);

    let interval = Duration::from_secs_f32(FEED_POLL_SECONDS);
    let feed = if let Some(path) = &args.feed_file {
        Some(FeedWorker::spawn(JsonFileSource::new(path), sender, interval, false)?)
    } else if args.feed_demo {
        Some(FeedWorker::spawn(demo_source(), sender, interval, false)?)
    } else {
        drop(sender);
        None
    };

    for _ in 0..args.drops {
        let tag = color_for(&mut driver, color);
        if let Err(e) = driver.drop_body(tag) {
            log::info!("Manual drop refused: {e}");
            break;
        }
    }

    // Polls are paced by simulated time so a headless run sees every cycle
    let polls_every = ((FEED_POLL_SECONDS * args.fps).round() as u64).max(1);
    let mut last_level = driver.sim().fill_level();
    for frame in 0..args.frames {
        if let Some(feed) = &feed {
            if frame % polls_every == 0 {
                feed.sync_now();
            }
        }
        if args.shake_at == Some(frame) {
            driver.shake();
        }

        let report = driver.frame(dt);
        if report.autodrop.rejected + report.feed.rejected > 0 {
            log::debug!(
                "Frame {frame}: {} drops refused",
                report.autodrop.rejected + report.feed.rejected
            );
        }

        let level = driver.sim().fill_level();
        if level != last_level {
            log::info!(
                "Frame {frame}: fill {:.1}% {}",
                driver.sim().fill_ratio() * 100.0,
                level.status_text()
            );
            last_level = level;
        }
    }

    if let Some(feed) = feed {
        let status = feed.status();
        log::info!("{} ({} polls, {} drops queued)", status.status_text, status.polls, status.requests_sent);
        if !status.last_error.is_empty() {
            log::warn!("Last feed error: {}", status.last_error);
        }
        feed.shutdown();
    }

    let summary = serde_json::to_string_pretty(&driver.sim().summary())?;
    log::info!("Finished {} frames", driver.sim().frame());
    println!("{summary}");
    Ok(())
}

fn color_for(driver: &mut FrameDriver, color: DropColor) -> ColorTag {
    match color {
        DropColor::Fixed(color) => color,
        DropColor::Random => driver.autodrop_mut().next_color(),
    }
}

/// A detector that reports a few threats over successive polls and fails once
fn demo_source() -> ScriptedSource {
    let detection = |name: &str, time: &str, severity_id: i64| Detection {
        threat_name: name.to_string(),
        detection_time: time.to_string(),
        severity_id: Some(severity_id),
        severity: None,
        resources: format!("file:_C:\\Users\\demo\\Downloads\\{name}.exe"),
    };
    let first = vec![
        detection("Trojan:Win32/Wacatac", "2024-05-01T10:00:00Z", 5),
        detection("PUA:Win32/Presenoker", "2024-05-01T10:02:00Z", 1),
    ];
    let mut second = first.clone();
    second.push(detection("Backdoor:MSIL/Bladabindi", "2024-05-01T10:05:00Z", 4));
    second.push(detection("Adware:Win32/Hotbar", "2024-05-01T10:06:00Z", 2));
    let mut third = second.clone();
    third.push(detection("Trojan:Win32/Wacatac", "2024-05-01T11:30:00Z", 5));

    ScriptedSource::new([
        Ok(FeedSnapshot {
            status: None,
            detections: first,
        }),
        Ok(FeedSnapshot {
            status: None,
            detections: second,
        }),
        Err(FeedError::Unavailable("detector busy".to_string())),
        Ok(FeedSnapshot {
            status: None,
            detections: third,
        }),
    ])
}
