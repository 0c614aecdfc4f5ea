use log::{info, warn};
use std::io::BufReader;
use std::process::{Child, ChildStdout, Command, Stdio};

use super::{Capture, CaptureError, FrameGeometry, FrameSource, PipeSource};

/// Port the vehicle streams its H.264 transport stream to
pub const VIDEO_PORT: u16 = 11111;

/// Frames of read-ahead kept between ffmpeg and us
const PIPE_BUFFER_FRAMES: usize = 4;

/// Arguments that turn the vehicle's stream into packed bgr24 on stdout
pub fn decode_args(video_port: u16) -> Vec<String> {
    let input = format!("udp://0.0.0.0:{video_port}");
    [
        "-loglevel",
        "quiet",
        "-i",
        input.as_str(),
        "-pix_fmt",
        "bgr24",
        "-vcodec",
        "rawvideo",
        "-an",
        "-sn",
        "-f",
        "rawvideo",
        "-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// The running ffmpeg process. Killed and reaped on [`DecoderProcess::stop`] or drop.
pub struct DecoderProcess {
    child: Option<Child>,
}

impl DecoderProcess {
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!("decoder kill failed: {e}");
            }
            match child.wait() {
                Ok(status) => info!("decoder stopped ({status})"),
                Err(e) => warn!("decoder wait failed: {e}"),
            }
        }
    }
}

impl Drop for DecoderProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

pub type DecoderOutput = PipeSource<BufReader<ChildStdout>>;

/// ffmpeg reading the vehicle's video port, exposed as a [`FrameSource`]
pub struct FfmpegDecoder {
    output: DecoderOutput,
    process: DecoderProcess,
}

impl FfmpegDecoder {
    pub fn spawn(video_port: u16, geometry: FrameGeometry) -> Result<Self, CaptureError> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(decode_args(video_port))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(CaptureError::Spawn)?;
        let stdout = child.stdout.take().ok_or_else(|| {
            CaptureError::Spawn(std::io::Error::other("ffmpeg stdout was not captured"))
        })?;
        info!(
            "decoder listening on udp port {video_port} ({}x{})",
            geometry.width, geometry.height
        );

        let reader = BufReader::with_capacity(geometry.frame_size() * PIPE_BUFFER_FRAMES, stdout);
        Ok(Self {
            output: PipeSource::new(reader, geometry),
            process: DecoderProcess { child: Some(child) },
        })
    }

    /// Separate the frame stream from the process handle so a reader thread can
    /// own one while the caller keeps the other
    pub fn into_parts(self) -> (DecoderOutput, DecoderProcess) {
        (self.output, self.process)
    }
}

impl FrameSource for FfmpegDecoder {
    fn next_capture(&mut self) -> Result<Capture, CaptureError> {
        self.output.next_capture()
    }

    fn stop(&mut self) {
        self.process.stop();
    }
}
