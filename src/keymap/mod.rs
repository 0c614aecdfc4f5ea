//! Key bindings.
//!
//! Every binding is data: the default flight layout is just the map built by
//! [`KeyMap::flight`], and a JSON file can override or drop any of it:
//!
//! ```json
//! { "w": { "send": "forward 50" }, "f": "ignore", "space": "snapshot" }
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::protocol::{Command, Direction, Flip, Rotation};
use crate::screen::Key;

#[derive(Debug, Error)]
pub enum KeymapError {
    #[error("failed to read keymap {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid keymap json")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Key(String),
}

/// What a key press does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send(Command),
    Snapshot,
    ToggleRecording,
    Quit,
}

/// Binding as written in a keymap file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Binding {
    Send(Command),
    Snapshot,
    ToggleRecording,
    Quit,
    /// Remove the default binding for this key
    Ignore,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    bindings: HashMap<Key, Action>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default flight layout.
    ///
    /// `w`/`s`/`a`/`d` move by `distance_cm`, `h`/`j` yaw by `degrees`,
    /// arrows up/down climb and descend, `f`/`v` flip, `t`/`l` take off and
    /// land, `p` snapshot, `r` record, `esc` quit.
    pub fn flight(distance_cm: u32, degrees: u32) -> Self {
        let mut map = Self::new();
        let mv = |d| Action::Send(Command::movement(d, distance_cm));
        map.bind(Key::Char('w'), mv(Direction::Forward));
        map.bind(Key::Char('s'), mv(Direction::Back));
        map.bind(Key::Char('d'), mv(Direction::Right));
        map.bind(Key::Char('a'), mv(Direction::Left));
        map.bind(Key::Up, mv(Direction::Up));
        map.bind(Key::Down, mv(Direction::Down));
        map.bind(
            Key::Char('j'),
            Action::Send(Command::rotate(Rotation::Clockwise, degrees)),
        );
        map.bind(
            Key::Char('h'),
            Action::Send(Command::rotate(Rotation::CounterClockwise, degrees)),
        );
        map.bind(Key::Char('f'), Action::Send(Command::flip(Flip::Forward)));
        map.bind(Key::Char('v'), Action::Send(Command::flip(Flip::Back)));
        map.bind(Key::Char('t'), Action::Send(Command::takeoff()));
        map.bind(Key::Char('l'), Action::Send(Command::land()));
        map.bind(Key::Char('p'), Action::Snapshot);
        map.bind(Key::Char('r'), Action::ToggleRecording);
        map.bind(Key::Esc, Action::Quit);
        map
    }

    /// View-only layout: `q` or `esc` closes the window
    pub fn viewer() -> Self {
        let mut map = Self::new();
        map.bind(Key::Char('q'), Action::Quit);
        map.bind(Key::Esc, Action::Quit);
        map
    }

    pub fn bind(&mut self, key: Key, action: Action) {
        self.bindings.insert(key, action);
    }

    pub fn unbind(&mut self, key: Key) {
        self.bindings.remove(&key);
    }

    pub fn action(&self, key: Key) -> Option<&Action> {
        self.bindings.get(&key)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Apply overrides from a JSON object of `key -> binding`
    pub fn apply_json(&mut self, json: &str) -> Result<(), KeymapError> {
        let overrides: HashMap<String, Binding> = serde_json::from_str(json)?;
        // Resolve every key first so a bad file leaves the map untouched
        let overrides = overrides
            .into_iter()
            .map(|(name, binding)| {
                let key: Key = name.parse().map_err(KeymapError::Key)?;
                Ok((key, binding))
            })
            .collect::<Result<Vec<(Key, Binding)>, KeymapError>>()?;
        for (key, binding) in overrides {
            match binding {
                Binding::Send(cmd) => self.bind(key, Action::Send(cmd)),
                Binding::Snapshot => self.bind(key, Action::Snapshot),
                Binding::ToggleRecording => self.bind(key, Action::ToggleRecording),
                Binding::Quit => self.bind(key, Action::Quit),
                Binding::Ignore => self.unbind(key),
            }
        }
        Ok(())
    }

    pub fn apply_file(&mut self, path: &Path) -> Result<(), KeymapError> {
        let json = std::fs::read_to_string(path).map_err(|source| KeymapError::Read {
            path: path.display().to_string(),
            source,
        })?;
        self.apply_json(&json)
    }

    /// Bindings sorted by key name, for the help text
    pub fn describe(&self) -> Vec<(String, String)> {
        let mut rows: Vec<(String, String)> = self
            .bindings
            .iter()
            .map(|(key, action)| {
                let what = match action {
                    Action::Send(cmd) => cmd.to_string(),
                    Action::Snapshot => "snapshot".to_string(),
                    Action::ToggleRecording => "toggle recording".to_string(),
                    Action::Quit => "quit".to_string(),
                };
                (key.to_string(), what)
            })
            .collect();
        rows.sort();
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MOVE_DISTANCE_CM, ROTATE_DEGREES};

    fn sent(map: &KeyMap, key: Key) -> Option<String> {
        match map.action(key) {
            Some(Action::Send(cmd)) => Some(cmd.to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_flight_layout() {
        let map = KeyMap::flight(MOVE_DISTANCE_CM, ROTATE_DEGREES);
        assert_eq!(sent(&map, Key::Char('w')).as_deref(), Some("forward 20"));
        assert_eq!(sent(&map, Key::Char('s')).as_deref(), Some("back 20"));
        assert_eq!(sent(&map, Key::Char('d')).as_deref(), Some("right 20"));
        assert_eq!(sent(&map, Key::Char('a')).as_deref(), Some("left 20"));
        assert_eq!(sent(&map, Key::Char('j')).as_deref(), Some("cw 45"));
        assert_eq!(sent(&map, Key::Char('h')).as_deref(), Some("ccw 45"));
        assert_eq!(sent(&map, Key::Up).as_deref(), Some("up 20"));
        assert_eq!(sent(&map, Key::Char('v')).as_deref(), Some("flip b"));
        assert_eq!(sent(&map, Key::Char('t')).as_deref(), Some("takeoff"));
        assert_eq!(map.action(Key::Char('p')), Some(&Action::Snapshot));
        assert_eq!(map.action(Key::Char('r')), Some(&Action::ToggleRecording));
        assert_eq!(map.action(Key::Esc), Some(&Action::Quit));
        assert_eq!(map.action(Key::Char('z')), None);
    }

    #[test]
    fn test_custom_magnitudes() {
        let map = KeyMap::flight(50, 90);
        assert_eq!(sent(&map, Key::Char('w')).as_deref(), Some("forward 50"));
        assert_eq!(sent(&map, Key::Char('j')).as_deref(), Some("cw 90"));
    }

    #[test]
    fn test_json_overrides() {
        let mut map = KeyMap::flight(20, 45);
        map.apply_json(
            r#"{
                "w": { "send": "forward 100" },
                "f": "ignore",
                "space": "snapshot",
                "q": "quit",
                "F2": "toggle_recording"
            }"#,
        )
        .unwrap();

        assert_eq!(sent(&map, Key::Char('w')).as_deref(), Some("forward 100"));
        assert_eq!(map.action(Key::Char('f')), None);
        assert_eq!(map.action(Key::Space), Some(&Action::Snapshot));
        assert_eq!(map.action(Key::Char('q')), Some(&Action::Quit));
        assert_eq!(map.action(Key::F(2)), Some(&Action::ToggleRecording));
        assert_eq!(map.action(Key::Char('p')), Some(&Action::Snapshot));
    }

    #[test]
    fn test_json_rejects_unknown_keys_and_bindings() {
        let mut map = KeyMap::new();
        assert!(matches!(
            map.apply_json(r#"{ "hyper": "quit" }"#),
            Err(KeymapError::Key(_))
        ));
        assert!(matches!(
            map.apply_json(r#"{ "x": "explode" }"#),
            Err(KeymapError::Parse(_))
        ));
        assert!(map.is_empty());
    }

    #[test]
    fn test_bad_override_file_changes_nothing() {
        let mut map = KeyMap::flight(20, 45);
        let before = map.describe();

        let result = map.apply_json(
            r#"{
                "w": "ignore",
                "a": "ignore",
                "s": { "send": "emergency" },
                "d": "quit",
                "p": "toggle_recording",
                "esc": "snapshot",
                "hyper": "quit"
            }"#,
        );

        assert!(matches!(result, Err(KeymapError::Key(ref k)) if k.contains("hyper")));
        assert_eq!(map.describe(), before);
    }

    #[test]
    fn test_viewer_layout_only_quits() {
        let map = KeyMap::viewer();
        assert_eq!(map.len(), 2);
        assert_eq!(map.action(Key::Char('q')), Some(&Action::Quit));
        assert_eq!(map.action(Key::Char('w')), None);
    }

    #[test]
    fn test_describe_is_sorted() {
        let rows = KeyMap::viewer().describe();
        assert_eq!(
            rows,
            vec![
                ("esc".to_string(), "quit".to_string()),
                ("q".to_string(), "quit".to_string()),
            ]
        );
    }
}
