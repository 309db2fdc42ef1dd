use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Ceiling on `snapshots * attributes` held before a query flushes a chunk.
pub const MAX_INTERVALS: usize = 1_000_000;

/// Tunables of the zoom engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ZoomConfig {
    /// Full-state query chunk ceiling, in interval cells.
    pub max_intervals: usize,

    /// Pixel width used to derive a resolution from a time range.
    pub display_width: i64,

    /// Gap re-search runs at `resolution / gap_resolution_divisor`.
    pub gap_resolution_divisor: i64,

    /// Raises the replay binary's log level to debug.
    pub debug: bool,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            max_intervals: MAX_INTERVALS,
            display_width: 1000,
            gap_resolution_divisor: 10,
            debug: false,
        }
    }
}

impl ZoomConfig {
    /// Reads a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read zoom config from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse zoom config {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// `TIMEGRAPH_DEBUG=1|true` forces debug logging on.
    pub fn apply_env(&mut self) {
        let debug_mode = std::env::var("TIMEGRAPH_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            self.debug = true;
        }
    }

    /// Writes the config as pretty JSON, readable back by [`ZoomConfig::load`].
    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write zoom config to {}", path.display()))
    }

    /// Resolution of the fine gap re-search for a coarse `resolution`.
    pub fn gap_resolution(&self, resolution: i64) -> i64 {
        (resolution / self.gap_resolution_divisor.max(1)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("timegraph-missing-{}.json", uuid::Uuid::new_v4()));
        let config = ZoomConfig::load(&path).unwrap();
        assert_eq!(config.max_intervals, MAX_INTERVALS);
        assert_eq!(config.display_width, 1000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = std::env::temp_dir().join(format!("timegraph-partial-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, r#"{ "maxIntervals": 64 }"#).unwrap();
        let config = ZoomConfig::load(&path).unwrap();
        assert_eq!(config.max_intervals, 64);
        assert_eq!(config.gap_resolution_divisor, 10);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn broken_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("timegraph-broken-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, "{ not json").unwrap();
        assert!(ZoomConfig::load(&path).is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn saved_config_loads_back() {
        let path = std::env::temp_dir().join(format!("timegraph-saved-{}.json", uuid::Uuid::new_v4()));
        let config = ZoomConfig {
            display_width: 640,
            gap_resolution_divisor: 4,
            ..ZoomConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = ZoomConfig::load(&path).unwrap();
        assert_eq!(loaded.display_width, 640);
        assert_eq!(loaded.gap_resolution_divisor, 4);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn gap_resolution_never_drops_below_one() {
        let config = ZoomConfig::default();
        assert_eq!(config.gap_resolution(100), 10);
        assert_eq!(config.gap_resolution(5), 1);
    }
}
