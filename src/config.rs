//! Application-level configuration loading: the song library location and the
//! defaults newly created rooms start from.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dto::room::RoomConfiguration;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "AMADEUS_CONFIG_PATH";
/// Library directory used when the configuration does not name one.
const DEFAULT_LIBRARY_DIR: &str = "library";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    library_dir: PathBuf,
    room_defaults: RoomConfiguration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in
    /// defaults when the file is missing or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        library = %config.library_dir.display(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Directory the song library is scanned from.
    pub fn library_dir(&self) -> &PathBuf {
        &self.library_dir
    }

    /// Configuration newly created rooms start from, before any lobby edits.
    pub fn room_defaults(&self) -> &RoomConfiguration {
        &self.room_defaults
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            library_dir: PathBuf::from(DEFAULT_LIBRARY_DIR),
            room_defaults: RoomConfiguration::default(),
        }
    }
}

fn resolve_config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file.
struct RawConfig {
    library_dir: Option<PathBuf>,
    room: Option<RawRoomDefaults>,
}

#[derive(Debug, Deserialize)]
/// Room defaults section; absent fields keep their documented defaults.
struct RawRoomDefaults {
    play_time: Option<u64>,
    guess_time: Option<u64>,
    review_time: Option<u64>,
    rounds: Option<u32>,
    max_players: Option<u32>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = RoomConfiguration::default();
        let room = value.room.map_or_else(
            || defaults.clone(),
            |raw| RoomConfiguration {
                play_time: raw.play_time.unwrap_or(defaults.play_time),
                guess_time: raw.guess_time.unwrap_or(defaults.guess_time),
                review_time: raw.review_time.unwrap_or(defaults.review_time),
                rounds: raw.rounds.unwrap_or(defaults.rounds),
                max_players: raw.max_players.unwrap_or(defaults.max_players),
            },
        );

        Self {
            library_dir: value
                .library_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LIBRARY_DIR)),
            room_defaults: room,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_config_merges_over_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"library_dir": "/srv/songs", "room": {"rounds": 5}}"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.library_dir(), &PathBuf::from("/srv/songs"));
        assert_eq!(config.room_defaults().rounds, 5);
        assert_eq!(config.room_defaults().play_time, 20);
    }

    #[test]
    fn empty_raw_config_is_all_defaults() {
        let raw: RawConfig = serde_json::from_str("{}").unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.library_dir(), &PathBuf::from(DEFAULT_LIBRARY_DIR));
        assert_eq!(config.room_defaults(), &RoomConfiguration::default());
    }
}
