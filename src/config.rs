//! Service configuration with defaults and environment fallbacks.

use std::path::PathBuf;

/// Default SQLite database file, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "acousticdna.sqlite3";
/// Default directory for transcoded and downloaded audio.
pub const DEFAULT_TEMP_DIR: &str = "/tmp";
/// Default target sample rate for analysis, in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 11_025;

/// Environment variable overriding the database path.
pub const ENV_DB_PATH: &str = "ACOUSTIC_DB_PATH";
/// Environment variable overriding the temp directory.
pub const ENV_TEMP_DIR: &str = "ACOUSTIC_TEMP_DIR";

/// Configuration for a service instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory for temporary audio conversion files.
    pub temp_dir: PathBuf,
    /// Target sample rate for audio processing, in Hz.
    pub sample_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl Config {
    /// Defaults overridden by `ACOUSTIC_DB_PATH` and `ACOUSTIC_TEMP_DIR` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            if !path.is_empty() {
                config.db_path = PathBuf::from(path);
            }
        }
        if let Ok(dir) = std::env::var(ENV_TEMP_DIR) {
            if !dir.is_empty() {
                config.temp_dir = PathBuf::from(dir);
            }
        }
        config
    }

    /// Replace the database path.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Replace the temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Replace the analysis sample rate.
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.db_path, PathBuf::from("acousticdna.sqlite3"));
        assert_eq!(config.temp_dir, PathBuf::from("/tmp"));
        assert_eq!(config.sample_rate, 11_025);
    }

    #[test]
    fn builder_methods_override_fields() {
        let config = Config::default()
            .with_db_path("/var/lib/test.db")
            .with_temp_dir("/var/tmp")
            .with_sample_rate(22_050);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/test.db"));
        assert_eq!(config.temp_dir, PathBuf::from("/var/tmp"));
        assert_eq!(config.sample_rate, 22_050);
    }
}
