//! Flight and viewing loops.

use chrono::{Local, NaiveDateTime};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::client::{self, CommandSink, LinkError, Sleeper};
use crate::keymap::{Action, KeyMap};
use crate::protocol::{ArmSequence, ArmStep, Command};
use crate::recording::{Assembler, Recorder, RecordingError};
use crate::screen::{Hud, Screen, KEY_POLL};
use crate::video::feed::FrameFeed;
use crate::video::{CaptureError, Frame, FrameReader, FrameSource};

/// Key poll timeout while waiting on pushed frames
const VIEW_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Recording(#[from] RecordingError),
    #[error(transparent)]
    Screen(#[from] anyhow::Error),
}

/// What a finished flight left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub stills: u64,
    pub commands: u64,
    pub discards: u64,
    pub video: Option<PathBuf>,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// One interactive flight: the link, the video, the keyboard and the recorder.
///
/// Everything runs on the calling thread: read a frame, draw it, sample one
/// key, act on it, then save the frame if recording.
pub struct Session<'a, S> {
    sink: &'a mut dyn CommandSink,
    reader: FrameReader<S>,
    screen: &'a mut dyn Screen,
    keymap: KeyMap,
    recorder: Recorder,
    assembler: &'a mut dyn Assembler,
    clock: fn() -> NaiveDateTime,
    hud: Hud,
    commands: u64,
}

impl<'a, S: FrameSource> Session<'a, S> {
    pub fn new(
        sink: &'a mut dyn CommandSink,
        reader: FrameReader<S>,
        screen: &'a mut dyn Screen,
        keymap: KeyMap,
        recorder: Recorder,
        assembler: &'a mut dyn Assembler,
    ) -> Self {
        Self {
            sink,
            reader,
            screen,
            keymap,
            recorder,
            assembler,
            clock: local_now,
            hud: Hud::default(),
            commands: 0,
        }
    }

    /// Replace the wall clock used to name snapshots and videos
    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn arm(
        &mut self,
        sequence: &ArmSequence,
        sleeper: &mut dyn Sleeper,
    ) -> Result<(), SessionError> {
        client::arm(&mut *self.sink, sequence, sleeper)?;
        self.commands += sequence
            .steps()
            .iter()
            .filter(|s| matches!(s, ArmStep::Send(_)))
            .count() as u64;
        Ok(())
    }

    fn send(&mut self, command: &Command) -> Result<(), SessionError> {
        self.sink.send(command)?;
        self.commands += 1;
        self.hud.last_command = Some(command.to_string());
        Ok(())
    }

    /// Fly until the quit key, then stop the decoder and assemble any recording.
    ///
    /// If the loop dies on its own (dead decoder, failed write, lost screen) the
    /// vehicle is still told to land and the recording is still assembled; the
    /// error that ended the loop is the one returned.
    pub fn run(&mut self) -> Result<SessionSummary, SessionError> {
        let outcome = self.fly();
        if let Err(ref e) = outcome {
            warn!("flight loop ended: {e}");
            if let Err(land) = self.send(&Command::land()) {
                warn!("landing after failure: {land}");
            }
        }

        self.reader.source_mut().stop();
        let finished = self.recorder.finish(&mut *self.assembler, (self.clock)());
        if let Err(e) = outcome {
            if let Err(ref assembly) = finished {
                warn!("{assembly}");
            }
            return Err(e);
        }
        let video = finished?;
        if let Some(ref path) = video {
            info!("video saved to {}", path.display());
        }

        Ok(SessionSummary {
            frames: self.hud.frames,
            stills: self.recorder.stills(),
            commands: self.commands,
            discards: self.reader.total_discards(),
            video,
        })
    }

    /// Read, draw, dispatch and record until the quit key lands the vehicle
    fn fly(&mut self) -> Result<(), SessionError> {
        loop {
            let frame = self.reader.next_frame()?;
            self.hud.frames += 1;
            self.hud.discards = self.reader.total_discards();
            self.hud.recording = self.recorder.is_recording();
            self.hud.stills = self.recorder.stills();
            self.screen.render(&frame, &self.hud)?;

            if let Some(key) = self.screen.poll_key(KEY_POLL)? {
                if let Some(action) = self.keymap.action(key).cloned() {
                    if !self.dispatch(action, &frame)? {
                        break;
                    }
                }
            }

            self.recorder.capture(&frame)?;
        }
        Ok(())
    }

    /// Returns false once the loop should end
    fn dispatch(&mut self, action: Action, frame: &Frame) -> Result<bool, SessionError> {
        match action {
            Action::Send(command) => self.send(&command)?,
            Action::Snapshot => {
                let path = self.recorder.snapshot(frame, (self.clock)())?;
                self.hud.notice = Some(format!("saved {}", path.display()));
            }
            Action::ToggleRecording => {
                self.recorder.toggle();
            }
            Action::Quit => {
                self.send(&Command::land())?;
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }
}

/// Show pushed frames until a quit key; nothing is sent to the vehicle.
/// Returns how many frames were drawn.
pub fn view(
    feed: &mut FrameFeed,
    screen: &mut dyn Screen,
    keymap: &KeyMap,
) -> Result<u64, SessionError> {
    let mut hud = Hud::default();
    loop {
        match feed.try_next() {
            Ok(Some(frame)) => {
                hud.frames += 1;
                screen.render(&frame, &hud)?;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("video ended: {e}");
                return Err(e.into());
            }
        }

        if let Some(key) = screen.poll_key(VIEW_POLL)? {
            if keymap.action(key) == Some(&Action::Quit) {
                break;
            }
        }
    }
    Ok(hud.frames)
}
