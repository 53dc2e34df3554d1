//! Application configuration.
//!
//! A named [`Profile`] supplies the database defaults; an optional TOML file
//! can override server, seed and per-profile database settings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown profile '{0}'. Possible values are development, testing and production")]
    UnknownProfile(String),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid PORT value '{0}'")]
    InvalidPort(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Development,
    Testing,
    Production,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Development => "development",
            Profile::Testing => "testing",
            Profile::Production => "production",
        }
    }

    pub fn is_test_mode(&self) -> bool {
        *self == Profile::Testing
    }

    pub fn debug(&self) -> bool {
        !matches!(self, Profile::Production)
    }

    pub fn default_database(&self) -> DatabaseConfig {
        let name = match self {
            Profile::Testing => "test_songs_db",
            Profile::Development | Profile::Production => "songs_db",
        };
        DatabaseConfig {
            name: name.to_string(),
            uri: "mongodb://localhost:27017".to_string(),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Profile::Development),
            "testing" => Ok(Profile::Testing),
            "production" => Ok(Profile::Production),
            _ => Err(ConfigError::UnknownProfile(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "database_name")]
    pub name: String,
    #[serde(rename = "database_uri")]
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub songs_path: Option<PathBuf>,
    pub ratings_path: Option<PathBuf>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            songs_path: Some(PathBuf::from("data/songs.json")),
            ratings_path: None,
        }
    }
}

/// Partial database settings as they appear under `[profiles.<name>]`.
#[derive(Debug, Clone, Default, Deserialize)]
struct DatabaseOverride {
    database_name: Option<String>,
    database_uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    server: Option<ServerConfig>,
    seed: Option<SeedConfig>,
    #[serde(default)]
    profiles: HashMap<String, DatabaseOverride>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub profile: Profile,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub seed: SeedConfig,
}

impl AppConfig {
    /// Configuration for a profile with no file overrides.
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            profile,
            server: ServerConfig::default(),
            database: profile.default_database(),
            seed: SeedConfig::default(),
        }
    }

    /// Load from the environment: `APP_PROFILE`, `CONFIG_FILE` (default
    /// `config.toml`, skipped when absent) and `PORT`.
    pub fn load() -> Result<Self, ConfigError> {
        let profile = match std::env::var("APP_PROFILE") {
            Ok(name) => name.parse()?,
            Err(_) => Profile::default(),
        };

        let config_file =
            PathBuf::from(std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string()));
        let contents = if config_file.exists() {
            Some(
                std::fs::read_to_string(&config_file).map_err(|source| ConfigError::Read {
                    path: config_file.clone(),
                    source,
                })?,
            )
        } else {
            None
        };

        let mut config = Self::from_toml(profile, contents.as_deref())?;

        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port.parse().map_err(|_| ConfigError::InvalidPort(port))?;
        }

        Ok(config)
    }

    /// Resolve a profile against optional TOML file contents.
    pub fn from_toml(profile: Profile, contents: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Self::for_profile(profile);
        let Some(contents) = contents else {
            return Ok(config);
        };

        let file: FileConfig = toml::from_str(contents)?;
        if let Some(server) = file.server {
            config.server = server;
        }
        if let Some(seed) = file.seed {
            config.seed = seed;
        }
        if let Some(db) = file.profiles.get(profile.as_str()) {
            if let Some(name) = &db.database_name {
                config.database.name = name.clone();
            }
            if let Some(uri) = &db.database_uri {
                config.database.uri = uri.clone();
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_defaults() {
        let dev = AppConfig::for_profile(Profile::Development);
        assert_eq!(dev.database.name, "songs_db");
        assert!(!dev.profile.is_test_mode());
        assert!(dev.profile.debug());

        let test = AppConfig::for_profile(Profile::Testing);
        assert_eq!(test.database.name, "test_songs_db");
        assert!(test.profile.is_test_mode());

        let prod = AppConfig::for_profile(Profile::Production);
        assert_eq!(prod.database.name, "songs_db");
        assert!(!prod.profile.debug());
    }

    #[test]
    fn parses_profile_names() {
        assert_eq!("testing".parse::<Profile>().unwrap(), Profile::Testing);
        assert_eq!(" Production ".parse::<Profile>().unwrap(), Profile::Production);
        assert!(matches!(
            "staging".parse::<Profile>(),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn file_overrides_selected_profile_only() {
        let contents = r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [seed]
            songs_path = "seed/songs.json"
            ratings_path = "seed/ratings.json"

            [profiles.testing]
            database_uri = "mongodb://mongo:27017"

            [profiles.production]
            database_name = "catalog"
        "#;

        let test = AppConfig::from_toml(Profile::Testing, Some(contents)).unwrap();
        assert_eq!(test.server.port, 9000);
        assert_eq!(test.database.name, "test_songs_db");
        assert_eq!(test.database.uri, "mongodb://mongo:27017");
        assert_eq!(test.seed.ratings_path, Some(PathBuf::from("seed/ratings.json")));

        let prod = AppConfig::from_toml(Profile::Production, Some(contents)).unwrap();
        assert_eq!(prod.database.name, "catalog");
        assert_eq!(prod.database.uri, "mongodb://localhost:27017");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = AppConfig::from_toml(Profile::Development, None).unwrap();
        assert_eq!(config, AppConfig::for_profile(Profile::Development));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let err = AppConfig::from_toml(Profile::Development, Some("[server\nport = 1")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
