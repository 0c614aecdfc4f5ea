use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::PilotConfig;
use crate::video::FrameGeometry;

#[derive(Parser)]
#[command(name = "tello-pilot")]
#[command(about = "🚁 Fly a Tello from the keyboard and watch its camera in the terminal", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fly with the keyboard while watching, snapshotting and recording video
    Fly {
        #[command(flatten)]
        link: LinkArgs,

        /// Directory for snapshots and recorded videos
        #[arg(short, long, default_value = "./imgs")]
        out_dir: PathBuf,

        /// Centimetres per movement key press
        #[arg(long, default_value_t = 20)]
        distance: u32,

        /// Degrees per rotation key press
        #[arg(long, default_value_t = 45)]
        angle: u32,

        /// JSON file overriding key bindings
        #[arg(short, long)]
        keymap: Option<PathBuf>,
    },

    /// Only watch the camera; frames are decoded on a background thread
    View {
        #[command(flatten)]
        link: LinkArgs,
    },
}

/// Options shared by every mode
#[derive(Args)]
pub struct LinkArgs {
    /// Vehicle command address
    #[arg(long, default_value = "192.168.10.1:8889")]
    pub drone: SocketAddr,

    /// Local port commands are sent from
    #[arg(long, default_value_t = 8889)]
    pub bind_port: u16,

    /// Local port the video stream arrives on
    #[arg(long, default_value_t = 11111)]
    pub video_port: u16,

    #[arg(long, default_value_t = 960)]
    pub width: u32,

    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Incomplete frames in a row before the decoder is declared dead
    #[arg(long, default_value_t = 300)]
    pub max_discards: u32,

    /// Pause after each startup command, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub arm_delay_ms: u64,

    /// Force a terminal graphics protocol: sixel, kitty, iterm2, halfblocks
    #[arg(short, long)]
    pub graphics: Option<String>,

    /// Where log records go while the video is on screen
    #[arg(long, default_value = "tello-pilot.log")]
    pub log_file: PathBuf,
}

impl LinkArgs {
    fn apply(self, config: &mut PilotConfig) {
        config.drone = self.drone;
        config.bind_port = self.bind_port;
        config.video_port = self.video_port;
        config.geometry = FrameGeometry::new(self.width, self.height);
        config.max_discards = self.max_discards;
        config.arm_pause = Duration::from_millis(self.arm_delay_ms);
        config.graphics = self.graphics;
        config.log_file = self.log_file;
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Commands {
    pub fn into_config(self) -> PilotConfig {
        let mut config = PilotConfig::default();
        match self {
            Commands::Fly {
                link,
                out_dir,
                distance,
                angle,
                keymap,
            } => {
                link.apply(&mut config);
                config.out_dir = out_dir;
                config.distance_cm = distance;
                config.degrees = angle;
                config.keymap = keymap;
            }
            Commands::View { link } => link.apply(&mut config),
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fly_defaults_equal_config_defaults() {
        let cli = Cli::try_parse_from(["tello-pilot", "fly"]).unwrap();
        let config = cli.command.into_config();
        let defaults = PilotConfig::default();

        assert_eq!(config.drone, defaults.drone);
        assert_eq!(config.bind_port, defaults.bind_port);
        assert_eq!(config.video_port, defaults.video_port);
        assert_eq!(config.geometry, defaults.geometry);
        assert_eq!(config.max_discards, defaults.max_discards);
        assert_eq!(config.arm_pause, defaults.arm_pause);
        assert_eq!(config.out_dir, defaults.out_dir);
        assert_eq!(config.distance_cm, defaults.distance_cm);
        assert_eq!(config.degrees, defaults.degrees);
        assert_eq!(config.log_file, defaults.log_file);
    }

    #[test]
    fn test_view_overrides() {
        let cli = Cli::try_parse_from([
            "tello-pilot",
            "view",
            "--drone",
            "127.0.0.1:9000",
            "--width",
            "320",
            "--height",
            "240",
            "-g",
            "kitty",
        ])
        .unwrap();
        let config = cli.command.into_config();
        assert_eq!(config.drone.port(), 9000);
        assert_eq!(config.geometry.frame_size(), 320 * 240 * 3);
        assert_eq!(config.graphics.as_deref(), Some("kitty"));
    }
}
