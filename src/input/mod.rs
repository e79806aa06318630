use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Config value that leaves an action without a key
pub const UNBOUND: &str = "none";

/// Keys the harness can bind to its reload and restart actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum KeyCode {
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl KeyCode {
    pub const ALL: [KeyCode; 12] = [
        KeyCode::F1,
        KeyCode::F2,
        KeyCode::F3,
        KeyCode::F4,
        KeyCode::F5,
        KeyCode::F6,
        KeyCode::F7,
        KeyCode::F8,
        KeyCode::F9,
        KeyCode::F10,
        KeyCode::F11,
        KeyCode::F12,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KeyCode::F1 => "F1",
            KeyCode::F2 => "F2",
            KeyCode::F3 => "F3",
            KeyCode::F4 => "F4",
            KeyCode::F5 => "F5",
            KeyCode::F6 => "F6",
            KeyCode::F7 => "F7",
            KeyCode::F8 => "F8",
            KeyCode::F9 => "F9",
            KeyCode::F10 => "F10",
            KeyCode::F11 => "F11",
            KeyCode::F12 => "F12",
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        KeyCode::ALL
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown key: {}", wanted))
    }
}

impl<'de> Deserialize<'de> for KeyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a config binding: a key name, or `none` / empty for no key
pub fn parse_binding(s: &str) -> Result<Option<KeyCode>, String> {
    let wanted = s.trim();
    if wanted.is_empty() || wanted.eq_ignore_ascii_case(UNBOUND) {
        return Ok(None);
    }
    wanted.parse().map(Some)
}

/// Serde adapter for optional bindings; TOML has no null, so an unbound key
/// is written as `"none"`.
mod binding {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{parse_binding, KeyCode, UNBOUND};

    pub fn serialize<S: Serializer>(key: &Option<KeyCode>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(key.map_or(UNBOUND, KeyCode::name))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<KeyCode>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_binding(&raw).map_err(serde::de::Error::custom)
    }
}

/// Source of per-frame key presses
pub trait HotkeyInput {
    /// True if `key` went down during the current frame
    fn was_pressed(&self, key: KeyCode) -> bool;
}

/// Reload and restart bindings; either may be unbound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hotkeys {
    #[serde(with = "binding")]
    pub reload: Option<KeyCode>,
    #[serde(with = "binding")]
    pub restart: Option<KeyCode>,
}

impl Default for Hotkeys {
    fn default() -> Self {
        Self {
            reload: Some(KeyCode::F5),
            restart: Some(KeyCode::F6),
        }
    }
}

impl Hotkeys {
    pub fn unbound() -> Self {
        Self {
            reload: None,
            restart: None,
        }
    }

    pub fn reload_pressed(&self, input: &dyn HotkeyInput) -> bool {
        self.reload.map_or(false, |key| input.was_pressed(key))
    }

    pub fn restart_pressed(&self, input: &dyn HotkeyInput) -> bool {
        self.restart.map_or(false, |key| input.was_pressed(key))
    }
}

/// Keys pressed since the last frame boundary
#[derive(Debug, Default)]
pub struct InputState {
    keys_pressed: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            keys_pressed: HashSet::new(),
        }
    }

    pub fn press(&mut self, key: KeyCode) {
        self.keys_pressed.insert(key);
    }

    /// Forget this frame's presses
    pub fn end_frame(&mut self) {
        self.keys_pressed.clear();
    }
}

impl HotkeyInput for InputState {
    fn was_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }
}

/// Input with nothing pressed
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl HotkeyInput for NoInput {
    fn was_pressed(&self, _key: KeyCode) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parsing() {
        assert_eq!("F5".parse::<KeyCode>(), Ok(KeyCode::F5));
        assert_eq!(" f12 ".parse::<KeyCode>(), Ok(KeyCode::F12));
        assert!("F13".parse::<KeyCode>().is_err());
        assert!("".parse::<KeyCode>().is_err());
    }

    #[test]
    fn test_binding_parsing() {
        assert_eq!(parse_binding("f7"), Ok(Some(KeyCode::F7)));
        assert_eq!(parse_binding("None"), Ok(None));
        assert_eq!(parse_binding("  "), Ok(None));
        assert!(parse_binding("F0").is_err());
    }

    #[test]
    fn test_presses_last_one_frame() {
        let mut input = InputState::new();
        input.press(KeyCode::F5);
        assert!(input.was_pressed(KeyCode::F5));
        assert!(!input.was_pressed(KeyCode::F6));

        input.end_frame();
        assert!(!input.was_pressed(KeyCode::F5));
    }

    #[test]
    fn test_unbound_hotkeys_never_fire() {
        let mut input = InputState::new();
        for key in KeyCode::ALL {
            input.press(key);
        }

        let hotkeys = Hotkeys::unbound();
        assert!(!hotkeys.reload_pressed(&input));
        assert!(!hotkeys.restart_pressed(&input));

        let hotkeys = Hotkeys::default();
        assert!(hotkeys.reload_pressed(&input));
        assert!(hotkeys.restart_pressed(&input));
    }
}
