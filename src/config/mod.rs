use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;

use crate::keymap::{KeyMap, KeymapError};
use crate::logging::LOG_FILE;
use crate::protocol::{ArmSequence, ARM_PAUSE, MOVE_DISTANCE_CM, ROTATE_DEGREES};
use crate::recording::OUTPUT_DIR;
use crate::video::decoder::VIDEO_PORT;
use crate::video::{FrameGeometry, MAX_DISCARDS};

/// Vehicle's fixed address on its own access point
pub const DRONE_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 10, 1);
pub const CMD_PORT: u16 = 8889;

/// Everything a session needs to know, with the vehicle's factory defaults
#[derive(Debug, Clone)]
pub struct PilotConfig {
    pub drone: SocketAddr,
    pub bind_port: u16,
    pub video_port: u16,
    pub geometry: FrameGeometry,
    pub max_discards: u32,
    pub arm_pause: Duration,
    pub graphics: Option<String>,
    pub out_dir: PathBuf,
    pub distance_cm: u32,
    pub degrees: u32,
    pub keymap: Option<PathBuf>,
    pub log_file: PathBuf,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            drone: SocketAddr::V4(SocketAddrV4::new(DRONE_IP, CMD_PORT)),
            bind_port: CMD_PORT,
            video_port: VIDEO_PORT,
            geometry: FrameGeometry::default(),
            max_discards: MAX_DISCARDS,
            arm_pause: ARM_PAUSE,
            graphics: None,
            out_dir: PathBuf::from(OUTPUT_DIR),
            distance_cm: MOVE_DISTANCE_CM,
            degrees: ROTATE_DEGREES,
            keymap: None,
            log_file: PathBuf::from(LOG_FILE),
        }
    }
}

impl PilotConfig {
    pub fn arm_sequence(&self) -> ArmSequence {
        ArmSequence::standard(self.arm_pause)
    }

    /// Flight layout with the configured magnitudes and any file overrides
    pub fn flight_keymap(&self) -> Result<KeyMap, KeymapError> {
        let mut map = KeyMap::flight(self.distance_cm, self.degrees);
        if let Some(ref path) = self.keymap {
            map.apply_file(path)?;
        }
        Ok(map)
    }
}
