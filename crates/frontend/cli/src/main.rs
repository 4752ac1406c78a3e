mod config;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::HostConfig;
use vcs_atari2600::Atari2600System;
use vcs_core::display::LatestFrame;
use vcs_core::scheduler::{Clock, FrameScheduler, SystemClock, VirtualClock};
use vcs_core::types::Frame;
use vcs_core::System;

/// Headless Atari 2600 TIA timing harness.
///
/// No 6502 core is attached, so the cartridge is mounted but never executed:
/// frames show the video chip's power-on state (background color only).
/// Useful for pacing, screenshot and save-state plumbing.
#[derive(Parser)]
#[command(
    name = "vcs",
    about = "Headless Atari 2600 TIA timing harness (cartridge code is not executed)"
)]
struct Args {
    /// Cartridge image (.a26 / .bin)
    rom: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// JSON host configuration (scheduler pacing, first visible scanline)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pace frames on the wall clock instead of virtual time
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Write the last frame as a PNG
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Dump a save state to this file as JSON
    #[arg(long)]
    save: Option<PathBuf>,

    /// Global emulator log level (off, error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Per-category emulator log level, e.g. --log-category tia=debug
    #[arg(long)]
    log_category: Vec<String>,

    /// Send emulator logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    config::apply_logging(
        args.log_level.as_deref(),
        &args.log_category,
        args.log_file.as_deref(),
    )?;

    let host = match &args.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };

    let rom = fs::read(&args.rom).with_context(|| format!("reading {}", args.rom.display()))?;
    let mut system = Atari2600System::new();
    system.set_first_visible_scanline(host.first_visible_scanline);
    system.mount("Cartridge", &rom)?;
    log::info!(
        "Loaded {} ({} bytes)",
        args.rom.display(),
        rom.len()
    );

    let latest = if args.realtime {
        let scheduler = FrameScheduler::new(system, SystemClock::new(), host.scheduler);
        run(scheduler, &args)?
    } else {
        let scheduler = FrameScheduler::new(system, VirtualClock::new(), host.scheduler);
        run(scheduler, &args)?
    };

    if let Some(path) = &args.screenshot {
        match latest.frame() {
            Some(frame) => {
                write_png(frame, path)?;
                log::info!("Screenshot written to {}", path.display());
            }
            None => bail!("no frame was produced, nothing to write to {}", path.display()),
        }
    }

    Ok(())
}

fn run<C: Clock>(
    mut scheduler: FrameScheduler<Atari2600System, C>,
    args: &Args,
) -> Result<LatestFrame> {
    let mut sink = LatestFrame::new();
    scheduler.play();
    let delivered = scheduler.run_frames(args.frames, &mut sink)?;
    scheduler.stop();

    let info = scheduler.system().debug_info();
    log::info!(
        "Ran {} frames, {:.1} fps (scanline {}, dot {})",
        delivered,
        scheduler.fps(),
        info.scanline,
        info.dot
    );
    println!("{} frames, {:.1} fps", delivered, scheduler.fps());

    if let Some(path) = &args.save {
        let state = scheduler.system().save_state();
        let mut f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write!(f, "{}", serde_json::to_string_pretty(&state)?)?;
        log::info!("Save state written to {}", path.display());
    }

    Ok(sink)
}

fn write_png(frame: &Frame, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&frame.pixels)?;
    Ok(())
}
