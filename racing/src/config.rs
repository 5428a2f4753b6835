use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::ai::AiParams;
use crate::car::CarParams;
use crate::items::ItemParams;
use crate::race::RaceParams;

pub const DEFAULT_CONFIG_PATH: &str = "racing/assets/config.toml";
pub const MAX_LOCAL_PLAYERS: usize = 4;
pub const MAX_CARS: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub tracks_dir: PathBuf,
    /// Track to race on; the first track of the catalog when unset.
    pub track: Option<String>,
    pub human_players: usize,
    pub ai_players: usize,
    /// Fixed RNG seed for reproducible races.
    pub seed: Option<u64>,
    pub car: CarParams,
    pub ai: AiParams,
    pub race: RaceParams,
    pub items: ItemParams,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tracks_dir: PathBuf::from("racing/assets/tracks"),
            track: None,
            human_players: 1,
            ai_players: 7,
            seed: None,
            car: CarParams::default(),
            ai: AiParams::default(),
            race: RaceParams::default(),
            items: ItemParams::default(),
        }
    }
}

impl GameConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(text)?;
        config.clamp_players();
        Ok(config)
    }

    /// Load a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Config path from the first CLI argument, or the default location.
    pub fn path_from_args() -> PathBuf {
        std::env::args()
            .nth(1)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("RACING_TRACKS_DIR") {
            self.tracks_dir = dir.into();
        }
        if let Some(track) = lookup("RACING_TRACK") {
            self.track = if track.trim().is_empty() {
                None
            } else {
                Some(track)
            };
        }
        if let Some(humans) = lookup("RACING_HUMANS") {
            match humans.trim().parse() {
                Ok(humans) => self.human_players = humans,
                Err(_) => warn!(value = %humans, "ignoring invalid RACING_HUMANS"),
            }
        }
        if let Some(ai) = lookup("RACING_AI") {
            match ai.trim().parse() {
                Ok(ai) => self.ai_players = ai,
                Err(_) => warn!(value = %ai, "ignoring invalid RACING_AI"),
            }
        }
        if let Some(seed) = lookup("RACING_SEED") {
            match seed.trim().parse() {
                Ok(seed) => self.seed = Some(seed),
                Err(_) => warn!(value = %seed, "ignoring invalid RACING_SEED"),
            }
        }
        self.clamp_players();
    }

    /// Keep the field within 1..=8 cars and at most four local players.
    pub fn clamp_players(&mut self) {
        if self.human_players > MAX_LOCAL_PLAYERS {
            warn!(
                requested = self.human_players,
                max = MAX_LOCAL_PLAYERS,
                "too many local players"
            );
            self.human_players = MAX_LOCAL_PLAYERS;
        }
        let max_ai = MAX_CARS - self.human_players;
        if self.ai_players > max_ai {
            warn!(requested = self.ai_players, max = max_ai, "too many AI players");
            self.ai_players = max_ai;
        }
        if self.total_cars() == 0 {
            warn!("no players configured, adding one AI player");
            self.ai_players = 1;
        }
    }

    pub fn total_cars(&self) -> usize {
        self.human_players + self.ai_players
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_uses_defaults() {
        let config = GameConfig::from_toml_str("").unwrap();
        assert_eq!(config.human_players, 1);
        assert_eq!(config.ai_players, 7);
        assert_eq!(config.tracks_dir, PathBuf::from("racing/assets/tracks"));
        assert!((config.car.max_speed + 0.04).abs() < 1e-6);
        assert_eq!(config.race.countdown_frames, 200);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = GameConfig::from_toml_str(
            r#"
            track = "oval"
            human_players = 2
            ai_players = 2
            seed = 7

            [car]
            acceleration = 0.0002

            [ai]
            lookahead_cap = 15.0
            "#,
        )
        .unwrap();
        assert_eq!(config.track.as_deref(), Some("oval"));
        assert_eq!(config.total_cars(), 4);
        assert_eq!(config.seed, Some(7));
        assert!((config.car.acceleration - 0.0002).abs() < 1e-9);
        assert!((config.car.friction - 0.992).abs() < 1e-6);
        assert!((config.ai.lookahead_cap - 15.0).abs() < 1e-6);
    }

    #[test]
    fn player_counts_are_clamped() {
        let config = GameConfig::from_toml_str("human_players = 6\nai_players = 9").unwrap();
        assert_eq!(config.human_players, MAX_LOCAL_PLAYERS);
        assert_eq!(config.total_cars(), MAX_CARS);

        let config = GameConfig::from_toml_str("human_players = 0\nai_players = 0").unwrap();
        assert_eq!(config.total_cars(), 1);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = GameConfig::from_toml_str(
            r#"
            [[controls]]
            up = "KeyW"
            "#,
        )
        .unwrap();
        assert_eq!(config.human_players, 1);
    }

    #[test]
    fn overrides_replace_fields() {
        let vars: HashMap<&str, &str> = [
            ("RACING_TRACKS_DIR", "/tmp/tracks"),
            ("RACING_TRACK", "speedway"),
            ("RACING_HUMANS", "0"),
            ("RACING_AI", "3"),
            ("RACING_SEED", "not a number"),
        ]
        .into_iter()
        .collect();

        let mut config = GameConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|value| value.to_string()));
        assert_eq!(config.tracks_dir, PathBuf::from("/tmp/tracks"));
        assert_eq!(config.track.as_deref(), Some("speedway"));
        assert_eq!(config.human_players, 0);
        assert_eq!(config.ai_players, 3);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GameConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.total_cars(), 8);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "human_players = \"two\"").unwrap();
        assert!(matches!(
            GameConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn shipped_config_parses() {
        let config = GameConfig::from_toml_str(include_str!("../assets/config.toml")).unwrap();
        assert_eq!(config.human_players, 1);
        assert_eq!(config.ai_players, 5);
        assert_eq!(config.race, RaceParams::default());
        assert_eq!(config.items, ItemParams::default());
    }
}
