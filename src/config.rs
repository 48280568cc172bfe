//! Coordinator configuration
//!
//! A plain struct with a `Default` impl and a couple of named presets, in
//! the same style as the host server's own configuration type: no builder,
//! no config-file parser, just fields an operator sets before constructing
//! a [`crate::Coordinator`].

use std::path::PathBuf;
use std::time::Duration;

use crate::recovery::RecoveryConfig;

/// Coordinator-wide configuration.
#[derive(Clone)]
pub struct Config {
    /// Directory holding the `extglobalxact/` log directory.
    pub data_dir: PathBuf,
    /// Retry pacing handed to every [`crate::recovery::RecoveryWorker`]
    /// this coordinator spawns.
    pub recovery: RecoveryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            recovery: RecoveryConfig::default(),
        }
    }
}

impl Config {
    /// A configuration tuned for test fixtures: fast retry so a test
    /// doesn't have to wait out a full production back-off.
    pub fn for_tests(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            recovery: RecoveryConfig {
                retry_interval: Duration::from_millis(10),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_relative_data_dir() {
        let config = Config::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn for_tests_uses_a_short_retry_interval() {
        let config = Config::for_tests(PathBuf::from("/tmp/x"));
        assert!(config.recovery.retry_interval < Duration::from_secs(1));
    }
}
