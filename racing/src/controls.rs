use std::path::Path;

use bevy::prelude::*;
use racing::config::MAX_LOCAL_PLAYERS;
use racing::player::ControlInput;
use serde::Deserialize;

/// Keyboard layout of one local player, keys named as bevy `KeyCode` variants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeyBindings {
    pub up: KeyCode,
    pub down: KeyCode,
    pub left: KeyCode,
    pub right: KeyCode,
    pub mirror: KeyCode,
    pub item: KeyCode,
}

impl KeyBindings {
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                up: KeyCode::KeyW,
                down: KeyCode::KeyS,
                left: KeyCode::KeyA,
                right: KeyCode::KeyD,
                mirror: KeyCode::ControlLeft,
                item: KeyCode::ShiftLeft,
            },
            Self {
                up: KeyCode::ArrowUp,
                down: KeyCode::ArrowDown,
                left: KeyCode::ArrowLeft,
                right: KeyCode::ArrowRight,
                mirror: KeyCode::ControlRight,
                item: KeyCode::ShiftRight,
            },
            Self {
                up: KeyCode::KeyI,
                down: KeyCode::KeyK,
                left: KeyCode::KeyJ,
                right: KeyCode::KeyL,
                mirror: KeyCode::KeyN,
                item: KeyCode::KeyB,
            },
            Self {
                up: KeyCode::Numpad8,
                down: KeyCode::Numpad5,
                left: KeyCode::Numpad4,
                right: KeyCode::Numpad6,
                mirror: KeyCode::Numpad1,
                item: KeyCode::Numpad0,
            },
        ]
    }

    pub fn read(&self, keys: &ButtonInput<KeyCode>) -> ControlInput {
        ControlInput {
            up: keys.pressed(self.up),
            down: keys.pressed(self.down),
            left: keys.pressed(self.left),
            right: keys.pressed(self.right),
            mirror: keys.pressed(self.mirror),
            use_item: keys.just_pressed(self.item),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ControlsFile {
    #[serde(default)]
    controls: Vec<KeyBindings>,
}

/// Parse the `[[controls]]` tables of a config file. Slots without an entry
/// keep their default layout.
pub fn parse_bindings(text: &str) -> Result<Vec<KeyBindings>, toml::de::Error> {
    let file: ControlsFile = toml::from_str(text)?;
    let mut bindings = KeyBindings::defaults();
    for (slot, custom) in file
        .controls
        .into_iter()
        .take(MAX_LOCAL_PLAYERS)
        .enumerate()
    {
        bindings[slot] = custom;
    }
    Ok(bindings)
}

pub fn load_bindings(path: &Path) -> Vec<KeyBindings> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return KeyBindings::defaults();
    };
    parse_bindings(&text).unwrap_or_else(|err| {
        warn!(path = %path.display(), "invalid key bindings, using defaults: {err}");
        KeyBindings::defaults()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_four_players() {
        let bindings = KeyBindings::defaults();
        assert_eq!(bindings.len(), MAX_LOCAL_PLAYERS);
        assert_eq!(bindings[1].up, KeyCode::ArrowUp);
        assert_eq!(bindings[3].item, KeyCode::Numpad0);
    }

    #[test]
    fn custom_bindings_replace_leading_slots() {
        let bindings = parse_bindings(
            r#"
            human_players = 2

            [[controls]]
            up = "KeyT"
            down = "KeyG"
            left = "KeyF"
            right = "KeyH"
            mirror = "KeyR"
            item = "KeyY"
            "#,
        )
        .unwrap();
        assert_eq!(bindings[0].up, KeyCode::KeyT);
        assert_eq!(bindings[0].item, KeyCode::KeyY);
        assert_eq!(bindings[1], KeyBindings::defaults()[1]);
    }

    #[test]
    fn unknown_key_names_are_rejected() {
        let result = parse_bindings(
            r#"
            [[controls]]
            up = "Warp"
            down = "KeyG"
            left = "KeyF"
            right = "KeyH"
            mirror = "KeyR"
            item = "KeyY"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn held_keys_map_to_control_input() {
        let mut keys = ButtonInput::<KeyCode>::default();
        keys.press(KeyCode::KeyW);
        keys.press(KeyCode::KeyA);
        let input = KeyBindings::defaults()[0].read(&keys);
        assert!(input.up && input.left);
        assert!(!input.down && !input.right && !input.use_item);
    }
}
