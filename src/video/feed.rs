//! Background frame feed for the view-only mode.
//!
//! Reads frames on a dedicated thread and pushes them to the renderer.

use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::{CaptureError, Frame, FrameReader, FrameSource};

/// Frames allowed in flight before new ones are dropped
const FEED_CAPACITY: usize = 2;

/// Frame reader running on its own thread.
/// Uses a bounded channel (capacity 2); if the renderer falls behind, newer
/// frames are dropped until it catches up.
pub struct FrameFeed {
    running: Arc<AtomicBool>,
    frame_rx: mpsc::Receiver<Result<Frame, CaptureError>>,
}

impl FrameFeed {
    /// Start reading `source` on a new thread.
    ///
    /// A thread blocked inside a read only notices [`FrameFeed::stop`] once the
    /// read returns, so stop the decoder process too.
    pub fn start<S>(source: S, max_discards: u32) -> Self
    where
        S: FrameSource + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (frame_tx, frame_rx) = mpsc::channel(FEED_CAPACITY);

        let running_clone = running.clone();
        std::thread::spawn(move || {
            feed_loop(FrameReader::new(source, max_discards), frame_tx, running_clone);
        });

        Self { running, frame_rx }
    }

    /// Latest pushed frame, if one is waiting
    pub fn try_next(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self.frame_rx.try_recv() {
            Ok(Ok(frame)) => Ok(Some(frame)),
            Ok(Err(e)) => Err(e),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(CaptureError::DecoderExited),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl Drop for FrameFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

fn feed_loop<S: FrameSource>(
    mut reader: FrameReader<S>,
    tx: mpsc::Sender<Result<Frame, CaptureError>>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        match reader.next_frame() {
            Ok(frame) => match tx.try_send(Ok(frame)) {
                Ok(_) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("renderer busy, frame dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            },
            Err(e) => {
                warn!("frame feed stopped: {e}");
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    }
}
