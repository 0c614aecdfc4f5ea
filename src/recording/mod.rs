//! Stills, recordings and the post-flight video assembly.

use chrono::NaiveDateTime;
use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use log::{info, warn};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use thiserror::Error;

use crate::video::Frame;

/// Where stills and videos land unless told otherwise
pub const OUTPUT_DIR: &str = "./imgs";
/// Per-frame recording images, under the output directory
pub const SCRATCH_DIR: &str = "tmp";
/// Recording stills trade quality for write speed
pub const JPEG_QUALITY: u8 = 50;
pub const VIDEO_FPS: u32 = 30;
/// Minute resolution: two snapshots in the same minute share a name
pub const STAMP_FORMAT: &str = "%Y%m%d%H%M";

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {path}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to start video assembler")]
    AssemblerSpawn(#[source] std::io::Error),
    #[error("video assembly failed ({status}): {stderr}")]
    Assembly { status: ExitStatus, stderr: String },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> RecordingError + '_ {
    move |source| RecordingError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Turns a numbered image sequence into a playable video
pub trait Assembler {
    /// `pattern` is a printf-style sequence such as `tmp/%d.jpg`
    fn assemble(&mut self, pattern: &Path, output: &Path, fps: u32)
        -> Result<(), RecordingError>;
}

/// Runs ffmpeg once, blocking until it exits
pub struct FfmpegAssembler;

impl FfmpegAssembler {
    pub fn args(pattern: &Path, output: &Path, fps: u32) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-y", "-loglevel", "error", "-i"]
            .iter()
            .map(|s| OsString::from(*s))
            .collect();
        args.push(pattern.into());
        for arg in ["-vcodec", "libx264", "-pix_fmt", "yuv420p", "-r"] {
            args.push(arg.into());
        }
        args.push(fps.to_string().into());
        args.push(output.into());
        args
    }
}

impl Assembler for FfmpegAssembler {
    fn assemble(
        &mut self,
        pattern: &Path,
        output: &Path,
        fps: u32,
    ) -> Result<(), RecordingError> {
        let result = Command::new("ffmpeg")
            .args(Self::args(pattern, output, fps))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .output()
            .map_err(RecordingError::AssemblerSpawn)?;
        check_assembly(result)
    }
}

/// Turn a finished ffmpeg run into a result, keeping its stderr on failure
fn check_assembly(result: Output) -> Result<(), RecordingError> {
    if result.status.success() {
        return Ok(());
    }
    Err(RecordingError::Assembly {
        status: result.status,
        stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
    })
}

/// Recording state plus everything written to disk during a session
pub struct Recorder {
    out_dir: PathBuf,
    scratch_dir: PathBuf,
    recording: bool,
    next_index: u64,
}

impl Recorder {
    /// Create `out_dir` if needed; recording starts off
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<Self, RecordingError> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir).map_err(io_err(&out_dir))?;
        let scratch_dir = out_dir.join(SCRATCH_DIR);
        Ok(Self {
            out_dir,
            scratch_dir,
            recording: false,
            next_index: 0,
        })
    }

    /// Flip recording on or off, returning the new state
    pub fn toggle(&mut self) -> bool {
        self.recording = !self.recording;
        info!("recording {}", if self.recording { "on" } else { "off" });
        self.recording
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Stills written so far; also the next still's number
    pub fn stills(&self) -> u64 {
        self.next_index
    }

    /// Numbered stills live here until assembly succeeds
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Save `frame` as the next numbered still if recording
    pub fn capture(&mut self, frame: &Frame) -> Result<Option<PathBuf>, RecordingError> {
        if !self.recording {
            return Ok(None);
        }
        fs::create_dir_all(&self.scratch_dir).map_err(io_err(&self.scratch_dir))?;

        let path = self.scratch_dir.join(format!("{}.jpg", self.next_index));
        let file = File::create(&path).map_err(io_err(&path))?;
        let mut writer = BufWriter::new(file);
        let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
        frame
            .to_rgb_image()
            .write_with_encoder(encoder)
            .map_err(|source| RecordingError::Encode {
                path: path.clone(),
                source,
            })?;
        writer.flush().map_err(io_err(&path))?;

        self.next_index += 1;
        Ok(Some(path))
    }

    /// Save `frame` as `<out_dir>/<YYYYMMDDHHMM>.png`.
    ///
    /// A second snapshot in the same minute overwrites the first.
    pub fn snapshot(&self, frame: &Frame, now: NaiveDateTime) -> Result<PathBuf, RecordingError> {
        let path = self
            .out_dir
            .join(format!("{}.png", now.format(STAMP_FORMAT)));
        frame
            .to_rgb_image()
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|source| RecordingError::Encode {
                path: path.clone(),
                source,
            })?;
        info!("snapshot saved to {}", path.display());
        Ok(path)
    }

    /// Assemble recorded stills into `<out_dir>/<YYYYMMDDHHMM>.mp4` and remove
    /// the scratch directory. Does nothing if nothing was ever recorded.
    ///
    /// The scratch directory is kept when assembly fails.
    pub fn finish(
        &self,
        assembler: &mut dyn Assembler,
        now: NaiveDateTime,
    ) -> Result<Option<PathBuf>, RecordingError> {
        if !self.scratch_dir.is_dir() {
            return Ok(None);
        }

        let output = self
            .out_dir
            .join(format!("{}.mp4", now.format(STAMP_FORMAT)));
        let pattern = self.scratch_dir.join("%d.jpg");
        info!("writing video {}", output.display());
        if let Err(e) = assembler.assemble(&pattern, &output, VIDEO_FPS) {
            warn!("keeping {} after failed assembly", self.scratch_dir.display());
            return Err(e);
        }

        fs::remove_dir_all(&self.scratch_dir).map_err(io_err(&self.scratch_dir))?;
        Ok(Some(output))
    }
}
