//! Raw video frames coming out of the decoder.
//!
//! The decoder writes packed `bgr24` frames back to back with no header, so
//! framing is nothing more than reading exactly `width * height * 3` bytes.

pub mod decoder;
pub mod feed;

use image::{ImageBuffer, RgbImage};
use log::debug;
use std::io::{ErrorKind, Read};
use thiserror::Error;

/// Tello camera stream resolution
pub const FRAME_WIDTH: u32 = 960;
pub const FRAME_HEIGHT: u32 = 720;
pub const CHANNELS: usize = 3;
/// Consecutive short reads tolerated before giving up on the decoder
pub const MAX_DISCARDS: u32 = 300;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to start decoder")]
    Spawn(#[source] std::io::Error),
    #[error("decoder output closed")]
    DecoderExited,
    #[error("decoder stalled: {discards} consecutive incomplete frames")]
    Stalled { discards: u32 },
    #[error("failed reading decoder output")]
    Read(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Bytes in one packed frame
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * CHANNELS
    }
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self::new(FRAME_WIDTH, FRAME_HEIGHT)
    }
}

/// One decoded frame: `height` rows of `width` pixels, channels in BGR order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    geometry: FrameGeometry,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap `data` as a frame, or `None` if its length is not exactly one frame
    pub fn from_bytes(geometry: FrameGeometry, data: Vec<u8>) -> Option<Self> {
        if data.len() != geometry.frame_size() {
            return None;
        }
        Some(Self { geometry, data })
    }

    #[cfg(test)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Channel `k` of the pixel at row `row`, column `col`
    pub fn channel(&self, row: usize, col: usize, k: usize) -> u8 {
        let width = self.geometry.width as usize;
        self.data[row * width * CHANNELS + col * CHANNELS + k]
    }

    /// `[b, g, r]` at row `row`, column `col`
    pub fn pixel(&self, row: usize, col: usize) -> [u8; 3] {
        [
            self.channel(row, col, 0),
            self.channel(row, col, 1),
            self.channel(row, col, 2),
        ]
    }

    /// Swap to RGB for encoders and the terminal
    pub fn to_rgb_image(&self) -> RgbImage {
        let (width, height) = (self.geometry.width as usize, self.geometry.height as usize);
        let mut rgb = Vec::with_capacity(self.data.len());
        for row in 0..height {
            for col in 0..width {
                let [b, g, r] = self.pixel(row, col);
                rgb.extend_from_slice(&[r, g, b]);
            }
        }
        // Length was checked in from_bytes
        ImageBuffer::from_raw(self.geometry.width, self.geometry.height, rgb)
            .unwrap_or_else(|| RgbImage::new(self.geometry.width, self.geometry.height))
    }
}

/// Result of one fixed-size read
#[derive(Debug)]
pub enum Capture {
    Frame(Frame),
    /// Fewer bytes than a frame before the stream ran dry
    Short { got: usize },
    EndOfStream,
}

/// Narrow view of the decoder: hand over the next frame or say why not
pub trait FrameSource {
    fn next_capture(&mut self) -> Result<Capture, CaptureError>;

    /// Ask whatever produces the frames to shut down
    fn stop(&mut self) {}
}

/// Frames read straight off any byte stream
pub struct PipeSource<R> {
    reader: R,
    geometry: FrameGeometry,
}

impl<R: Read> PipeSource<R> {
    pub fn new(reader: R, geometry: FrameGeometry) -> Self {
        Self { reader, geometry }
    }

    /// Fill `buf` until full or EOF, returning how much was read
    fn fill(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> FrameSource for PipeSource<R> {
    fn next_capture(&mut self) -> Result<Capture, CaptureError> {
        let mut buf = vec![0u8; self.geometry.frame_size()];
        let got = self.fill(&mut buf)?;
        if got == 0 {
            return Ok(Capture::EndOfStream);
        }
        buf.truncate(got);
        match Frame::from_bytes(self.geometry, buf) {
            Some(frame) => Ok(Capture::Frame(frame)),
            None => Ok(Capture::Short { got }),
        }
    }
}

/// Applies the discard policy on top of a [`FrameSource`].
///
/// Incomplete frames are dropped and the read retried, up to `max_discards`
/// in a row. A closed stream is fatal straight away.
pub struct FrameReader<S> {
    source: S,
    max_discards: u32,
    discards: u32,
    total_discards: u64,
}

impl<S: FrameSource> FrameReader<S> {
    pub fn new(source: S, max_discards: u32) -> Self {
        Self {
            source,
            max_discards,
            discards: 0,
            total_discards: 0,
        }
    }

    pub fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        loop {
            match self.source.next_capture()? {
                Capture::Frame(frame) => {
                    self.discards = 0;
                    return Ok(frame);
                }
                Capture::Short { got } => {
                    self.discards += 1;
                    self.total_discards += 1;
                    debug!("no image ({got} bytes), discarded");
                    if self.discards >= self.max_discards {
                        return Err(CaptureError::Stalled {
                            discards: self.discards,
                        });
                    }
                }
                Capture::EndOfStream => return Err(CaptureError::DecoderExited),
            }
        }
    }

    /// Incomplete frames dropped over the reader's lifetime
    pub fn total_discards(&self) -> u64 {
        self.total_discards
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::io::Cursor;

    /// Frame with every byte set from its offset
    pub(crate) fn patterned_frame(geometry: FrameGeometry, seed: u8) -> Vec<u8> {
        (0..geometry.frame_size())
            .map(|i| (i as u8).wrapping_add(seed))
            .collect()
    }

    /// Replays a scripted list of captures
    pub(crate) struct ScriptedSource {
        pub script: VecDeque<Capture>,
    }

    impl FrameSource for ScriptedSource {
        fn next_capture(&mut self) -> Result<Capture, CaptureError> {
            Ok(self.script.pop_front().unwrap_or(Capture::EndOfStream))
        }
    }

    /// Hands out at most `chunk` bytes per read, like a pipe under load
    struct Trickle {
        inner: Cursor<Vec<u8>>,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.inner.read(&mut buf[..n])
        }
    }

    proptest! {
        #[test]
        fn test_reshape_matches_offsets(
            width in 1u32..12,
            height in 1u32..12,
            seed in any::<u8>(),
        ) {
            let geometry = FrameGeometry::new(width, height);
            let bytes = patterned_frame(geometry, seed);
            let frame = Frame::from_bytes(geometry, bytes.clone()).unwrap();
            for r in 0..height as usize {
                for c in 0..width as usize {
                    for k in 0..CHANNELS {
                        let offset = r * width as usize * 3 + c * 3 + k;
                        prop_assert_eq!(frame.channel(r, c, k), bytes[offset]);
                    }
                }
            }
        }

        #[test]
        fn test_wrong_length_is_not_a_frame(len in 0usize..200) {
            let geometry = FrameGeometry::new(5, 4);
            prop_assume!(len != geometry.frame_size());
            prop_assert!(Frame::from_bytes(geometry, vec![0; len]).is_none());
        }
    }

    #[test]
    fn test_rgb_conversion_swaps_channels() {
        let geometry = FrameGeometry::new(2, 1);
        let frame = Frame::from_bytes(geometry, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(frame.pixel(0, 1), [4, 5, 6]);
        let rgb = frame.to_rgb_image();
        assert_eq!(rgb.get_pixel(0, 0).0, [3, 2, 1]);
        assert_eq!(rgb.get_pixel(1, 0).0, [6, 5, 4]);
    }

    #[test]
    fn test_pipe_source_reassembles_partial_reads() {
        let geometry = FrameGeometry::new(4, 3);
        let mut stream = patterned_frame(geometry, 0);
        stream.extend(patterned_frame(geometry, 7));
        let mut source = PipeSource::new(
            Trickle {
                inner: Cursor::new(stream),
                chunk: 5,
            },
            geometry,
        );

        for seed in [0u8, 7] {
            match source.next_capture().unwrap() {
                Capture::Frame(frame) => {
                    assert_eq!(frame.as_bytes(), patterned_frame(geometry, seed).as_slice())
                }
                other => panic!("expected a frame, got {other:?}"),
            }
        }
        assert!(matches!(source.next_capture().unwrap(), Capture::EndOfStream));
    }

    #[test]
    fn test_pipe_source_reports_short_tail() {
        let geometry = FrameGeometry::new(4, 3);
        let mut stream = patterned_frame(geometry, 0);
        stream.extend([1, 2, 3, 4, 5]);
        let mut source = PipeSource::new(Cursor::new(stream), geometry);

        assert!(matches!(source.next_capture().unwrap(), Capture::Frame(_)));
        assert!(matches!(
            source.next_capture().unwrap(),
            Capture::Short { got: 5 }
        ));
        assert!(matches!(source.next_capture().unwrap(), Capture::EndOfStream));
    }

    #[test]
    fn test_reader_skips_short_reads() {
        let geometry = FrameGeometry::new(2, 2);
        let good = Frame::from_bytes(geometry, patterned_frame(geometry, 3)).unwrap();
        let source = ScriptedSource {
            script: VecDeque::from([
                Capture::Short { got: 1 },
                Capture::Short { got: 11 },
                Capture::Frame(good.clone()),
            ]),
        };
        let mut reader = FrameReader::new(source, 5);

        assert_eq!(reader.next_frame().unwrap(), good);
        assert_eq!(reader.total_discards(), 2);
    }

    #[test]
    fn test_reader_gives_up_after_max_discards() {
        let source = ScriptedSource {
            script: (0..10).map(|got| Capture::Short { got }).collect(),
        };
        let mut reader = FrameReader::new(source, 4);

        match reader.next_frame() {
            Err(CaptureError::Stalled { discards }) => assert_eq!(discards, 4),
            other => panic!("expected a stall, got {other:?}"),
        }
    }

    #[test]
    fn test_good_frame_resets_discard_run() {
        let geometry = FrameGeometry::new(1, 1);
        let good = || Capture::Frame(Frame::from_bytes(geometry, vec![9, 9, 9]).unwrap());
        let source = ScriptedSource {
            script: VecDeque::from([
                Capture::Short { got: 1 },
                Capture::Short { got: 1 },
                good(),
                Capture::Short { got: 2 },
                Capture::Short { got: 2 },
                good(),
            ]),
        };
        let mut reader = FrameReader::new(source, 3);

        assert!(reader.next_frame().is_ok());
        assert!(reader.next_frame().is_ok());
        assert_eq!(reader.total_discards(), 4);
    }

    #[test]
    fn test_reader_fails_fast_on_closed_stream() {
        let source = ScriptedSource {
            script: VecDeque::new(),
        };
        let mut reader = FrameReader::new(source, 100);
        assert!(matches!(reader.next_frame(), Err(CaptureError::DecoderExited)));
    }
}
