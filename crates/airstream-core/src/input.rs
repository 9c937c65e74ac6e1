//! Pointer and keyboard input

use serde::{Deserialize, Serialize};

/// Pointer input over the player
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointerInput {
    /// Pointer moved anywhere over the player
    Move,
    /// Pointer entered the control strip
    EnterControls,
    /// Pointer left the control strip
    LeaveControls,
    /// Click/tap on the video surface at a horizontal position in [0, 1]
    Activate { x_fraction: f64 },
    /// Pointer over the scrub track at a position in [0, 1]
    HoverTrack { fraction: f64 },
    /// Pointer left the scrub track
    LeaveTrack,
    /// Scrub track input at a position in [0, 1]
    Scrub { fraction: f64 },
}

/// Keys the player reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Space,
    ArrowLeft,
    ArrowRight,
    Char(char),
    Other,
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` value
    pub fn from_dom_key(key: &str) -> Self {
        match key {
            " " | "Spacebar" => Key::Space,
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c.to_ascii_lowercase()),
                    _ => Key::Other,
                }
            }
        }
    }
}

/// A key press plus where focus was when it happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    pub key: Key,
    /// Focus is inside a text field; shortcuts must not fire
    pub in_text_input: bool,
}

impl KeyInput {
    pub fn new(key: Key) -> Self {
        Self { key, in_text_input: false }
    }

    pub fn in_text_field(key: Key) -> Self {
        Self { key, in_text_input: true }
    }

    /// Resolve the shortcut, if any
    pub fn command(&self, seek_step: f64) -> Option<KeyCommand> {
        if self.in_text_input {
            return None;
        }
        match self.key {
            Key::Space | Key::Char('k') => Some(KeyCommand::TogglePlay),
            Key::ArrowLeft => Some(KeyCommand::SeekBy(-seek_step)),
            Key::ArrowRight => Some(KeyCommand::SeekBy(seek_step)),
            Key::Char('m') => Some(KeyCommand::ToggleMute),
            Key::Char('f') => Some(KeyCommand::ToggleFullscreen),
            _ => None,
        }
    }
}

/// Player command bound to a key
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyCommand {
    TogglePlay,
    SeekBy(f64),
    ToggleMute,
    ToggleFullscreen,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcuts() {
        let cmd = |k: &str| KeyInput::new(Key::from_dom_key(k)).command(5.0);
        assert_eq!(cmd(" "), Some(KeyCommand::TogglePlay));
        assert_eq!(cmd("k"), Some(KeyCommand::TogglePlay));
        assert_eq!(cmd("K"), Some(KeyCommand::TogglePlay));
        assert_eq!(cmd("ArrowLeft"), Some(KeyCommand::SeekBy(-5.0)));
        assert_eq!(cmd("ArrowRight"), Some(KeyCommand::SeekBy(5.0)));
        assert_eq!(cmd("m"), Some(KeyCommand::ToggleMute));
        assert_eq!(cmd("f"), Some(KeyCommand::ToggleFullscreen));
        assert_eq!(cmd("x"), None);
        assert_eq!(cmd("Enter"), None);
    }

    #[test]
    fn test_text_input_suppresses_shortcuts() {
        let input = KeyInput::in_text_field(Key::Space);
        assert_eq!(input.command(5.0), None);
        assert_eq!(KeyInput::in_text_field(Key::Char('f')).command(5.0), None);
    }
}
