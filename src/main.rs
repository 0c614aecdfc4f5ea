mod cli;
mod client;
mod config;
mod keymap;
mod logging;
mod protocol;
mod recording;
mod screen;
mod session;
mod video;

use anyhow::{Context, Result};
use cli::Cli;
use client::{CommandChannel, ThreadSleeper};
use config::PilotConfig;
use keymap::KeyMap;
use log::LevelFilter;
use logging::LogRouter;
use recording::{FfmpegAssembler, Recorder};
use screen::terminal::TerminalScreen;
use session::Session;
use video::decoder::FfmpegDecoder;
use video::feed::FrameFeed;
use video::FrameReader;

fn main() -> Result<()> {
    let logs = LogRouter::init(LevelFilter::Warn).context("failed to start logger")?;

    let cli = Cli::parse_args();
    match cli.command {
        command @ cli::Commands::Fly { .. } => fly(command.into_config(), &logs),
        command @ cli::Commands::View { .. } => view(command.into_config(), &logs),
    }
}

fn fly(config: PilotConfig, logs: &LogRouter) -> Result<()> {
    let keymap = config.flight_keymap().context("failed to load keymap")?;
    let recorder = Recorder::new(&config.out_dir).context("failed to prepare output directory")?;
    let mut channel = CommandChannel::bind(config.bind_port, config.drone)?;

    println!("🚁 Commanding {}", config.drone);
    println!("📁 Saving to {}", config.out_dir.display());
    for (key, what) in keymap.describe() {
        println!("   {:>9}  {}", key, what);
    }

    let decoder = FfmpegDecoder::spawn(config.video_port, config.geometry)
        .context("failed to start ffmpeg (is it installed?)")?;
    let diversion = logs
        .divert(&config.log_file)
        .with_context(|| format!("failed to open log file {}", config.log_file.display()))?;
    let mut screen = TerminalScreen::open("🚁 fly", config.graphics.as_deref())?;
    let mut assembler = FfmpegAssembler;

    let (result, scratch) = {
        let mut session = Session::new(
            &mut channel,
            FrameReader::new(decoder, config.max_discards),
            &mut screen,
            keymap,
            recorder,
            &mut assembler,
        );
        let result = session
            .arm(&config.arm_sequence(), &mut ThreadSleeper)
            .and_then(|_| session.run());
        (result, session.recorder().scratch_dir().to_path_buf())
    };
    // Leave the alternate screen before printing anything
    drop(screen);
    drop(diversion);

    if result.is_err() && scratch.is_dir() {
        eprintln!("📁 Recorded stills kept in {}", scratch.display());
    }
    let summary = result?;
    println!(
        "✅ Landed after {} frames, {} commands sent",
        summary.frames, summary.commands
    );
    if summary.discards > 0 {
        println!("⚠️  {} incomplete frames dropped", summary.discards);
    }
    if let Some(video) = summary.video {
        println!("🎬 Video saved to {}", video.display());
    }
    Ok(())
}

fn view(config: PilotConfig, logs: &LogRouter) -> Result<()> {
    let mut channel = CommandChannel::bind(config.bind_port, config.drone)?;
    println!("📺 Watching {}", config.drone);
    client::arm(&mut channel, &config.arm_sequence(), &mut ThreadSleeper)?;

    let decoder = FfmpegDecoder::spawn(config.video_port, config.geometry)
        .context("failed to start ffmpeg (is it installed?)")?;
    let (output, mut process) = decoder.into_parts();
    let mut feed = FrameFeed::start(output, config.max_discards);

    let result = {
        let _diversion = logs
            .divert(&config.log_file)
            .with_context(|| format!("failed to open log file {}", config.log_file.display()))?;
        let mut screen = TerminalScreen::open("📺 view", config.graphics.as_deref())?;
        let result = session::view(&mut feed, &mut screen, &KeyMap::viewer());

        // Killing ffmpeg closes the pipe the feed thread is blocked on
        feed.stop();
        process.stop();
        result
    };

    let frames = result?;
    println!("✅ {} frames shown", frames);
    Ok(())
}
