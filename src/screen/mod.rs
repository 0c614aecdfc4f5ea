pub mod terminal;
pub mod viewer;

use anyhow::Result;
use crossterm::event::KeyCode;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::video::Frame;

/// Poll timeout per frame; keeps rendering from waiting on the keyboard
pub const KEY_POLL: Duration = Duration::from_millis(1);

/// Where frames are shown and keys come from
pub trait Screen {
    fn render(&mut self, frame: &Frame, hud: &Hud) -> Result<()>;
    /// At most one key press, waiting no longer than `timeout`
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<Key>>;
}

/// Status shown under the video
#[derive(Debug, Clone, Default)]
pub struct Hud {
    pub recording: bool,
    pub frames: u64,
    pub stills: u64,
    pub discards: u64,
    pub last_command: Option<String>,
    pub notice: Option<String>,
}

impl Hud {
    pub fn status_line(&self) -> String {
        let mut parts = vec![if self.recording {
            format!("● REC {}", self.stills)
        } else {
            "○ idle".to_string()
        }];
        parts.push(format!("frames {}", self.frames));
        if self.discards > 0 {
            parts.push(format!("dropped {}", self.discards));
        }
        if let Some(ref cmd) = self.last_command {
            parts.push(format!(">> {}", cmd));
        }
        if let Some(ref notice) = self.notice {
            parts.push(notice.clone());
        }
        parts.join("  │  ")
    }
}

/// Keyboard key as named in keymap files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Esc,
    Enter,
    Tab,
    Space,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    F(u8),
}

impl Key {
    pub fn from_code(code: KeyCode) -> Option<Self> {
        let key = match code {
            KeyCode::Char(' ') => Key::Space,
            KeyCode::Char(c) => Key::Char(c),
            KeyCode::Esc => Key::Esc,
            KeyCode::Enter => Key::Enter,
            KeyCode::Tab => Key::Tab,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            KeyCode::Left => Key::Left,
            KeyCode::Right => Key::Right,
            KeyCode::F(n) => Key::F(n),
            _ => return None,
        };
        Some(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c),
            Key::Esc => f.write_str("esc"),
            Key::Enter => f.write_str("enter"),
            Key::Tab => f.write_str("tab"),
            Key::Space => f.write_str("space"),
            Key::Backspace => f.write_str("backspace"),
            Key::Up => f.write_str("up"),
            Key::Down => f.write_str("down"),
            Key::Left => f.write_str("left"),
            Key::Right => f.write_str("right"),
            Key::F(n) => write!(f, "f{}", n),
        }
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(if c == ' ' { Key::Space } else { Key::Char(c) });
        }

        let lower = s.to_lowercase();
        let key = match lower.as_str() {
            "esc" | "escape" => Key::Esc,
            "enter" | "return" => Key::Enter,
            "tab" => Key::Tab,
            "space" => Key::Space,
            "backspace" => Key::Backspace,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            other => match other.strip_prefix('f').map(str::parse::<u8>) {
                Some(Ok(n)) if (1..=24).contains(&n) => Key::F(n),
                _ => return Err(format!("unknown key '{}'", s)),
            },
        };
        Ok(key)
    }
}
