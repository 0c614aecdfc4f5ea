use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default travel for a single movement key press, in centimetres
pub const MOVE_DISTANCE_CM: u32 = 20;
/// Default yaw for a single rotation key press, in degrees
pub const ROTATE_DEGREES: u32 = 45;
/// Default pause between arm steps
pub const ARM_PAUSE: Duration = Duration::from_secs(1);

/// A text command as the vehicle reads it off the wire.
///
/// Nothing is validated here: a command the firmware does not understand is
/// simply ignored by the vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(String);

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Enter SDK mode
    pub fn sdk_mode() -> Self {
        Self::new("command")
    }

    pub fn stream_on() -> Self {
        Self::new("streamon")
    }

    pub fn takeoff() -> Self {
        Self::new("takeoff")
    }

    pub fn land() -> Self {
        Self::new("land")
    }

    pub fn movement(direction: Direction, distance_cm: u32) -> Self {
        Self(format!("{} {}", direction.as_str(), distance_cm))
    }

    pub fn rotate(rotation: Rotation, degrees: u32) -> Self {
        Self(format!("{} {}", rotation.as_str(), degrees))
    }

    pub fn flip(flip: Flip) -> Self {
        Self(format!("flip {}", flip.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact datagram payload
    pub fn as_bytes(&self) -> &[u8] {
        self.as_str().as_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Back,
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Back => "back",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

impl Rotation {
    fn as_str(self) -> &'static str {
        match self {
            Rotation::Clockwise => "cw",
            Rotation::CounterClockwise => "ccw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flip {
    Forward,
    Back,
}

impl Flip {
    fn as_str(self) -> &'static str {
        match self {
            Flip::Forward => "f",
            Flip::Back => "b",
        }
    }
}

/// One step of the startup handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArmStep {
    Send(Command),
    Pause(Duration),
}

/// Startup handshake: puts the vehicle in SDK mode and asks for video.
///
/// The vehicle never acknowledges anything we rely on, so the pauses are plain
/// timing assumptions. They run through a [`crate::client::Sleeper`] so tests
/// do not have to wait on the wall clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmSequence {
    steps: Vec<ArmStep>,
}

impl ArmSequence {
    pub fn new(steps: Vec<ArmStep>) -> Self {
        Self { steps }
    }

    /// `command`, pause, `streamon`, pause
    pub fn standard(pause: Duration) -> Self {
        Self::new(vec![
            ArmStep::Send(Command::sdk_mode()),
            ArmStep::Pause(pause),
            ArmStep::Send(Command::stream_on()),
            ArmStep::Pause(pause),
        ])
    }

    pub fn steps(&self) -> &[ArmStep] {
        &self.steps
    }
}

impl Default for ArmSequence {
    fn default() -> Self {
        Self::standard(ARM_PAUSE)
    }
}
