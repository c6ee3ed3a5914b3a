//! Engine configuration.
//!
//! Every section falls back to its defaults, so an empty JSON object is a
//! valid configuration:
//!
//! ```
//! use cairn_engine::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "tracker": { "max_depth": 16 } }"#).unwrap();
//! assert_eq!(config.tracker.max_depth, 16);
//! assert_eq!(config.log_filter, "warn");
//! ```

use std::path::Path;

use anyhow::Context;
use cairn_tracking::tracker::TrackerConfig;
use cairn_world::world::World;
use serde::{Deserialize, Serialize};

use crate::server::WorldServer;
use crate::tick::{TickConfig, TickLoop};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tracker: TrackerConfig,
    pub tick: TickConfig,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            tick: TickConfig::default(),
            log_filter: "warn".to_owned(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("failed to parse engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// Reject values the tracker or tick loop would panic on.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.tracker.max_depth >= 2,
            "tracker.max_depth must leave room above the baseline, got {}",
            self.tracker.max_depth
        );
        anyhow::ensure!(
            self.tick.fixed_dt > 0.0 && self.tick.fixed_dt.is_finite(),
            "tick.fixed_dt must be positive and finite, got {}",
            self.tick.fixed_dt
        );
        anyhow::ensure!(
            self.tick.max_ticks_per_advance > 0,
            "tick.max_ticks_per_advance must be at least 1"
        );
        Ok(())
    }

    /// A tick loop over `world` built from this configuration.
    pub fn build(&self, world: World) -> TickLoop {
        let server = WorldServer::with_config(world, self.tracker.clone());
        TickLoop::new(server, self.tick.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(EngineConfig::from_json_str("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "tick": { "fixed_dt": 0.0 } }"#).unwrap_err();
        assert!(err.to_string().contains("fixed_dt"));

        let err = EngineConfig::from_json_str(r#"{ "tracker": { "max_depth": 1 } }"#).unwrap_err();
        assert!(err.to_string().contains("max_depth"));
    }

    #[test]
    fn malformed_json_has_context() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn missing_file_names_path() {
        let err = EngineConfig::load("/nonexistent/cairn.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cairn.json"));
    }

    #[test]
    fn build_applies_sections() {
        let config = EngineConfig::from_json_str(
            r#"{ "tracker": { "max_depth": 8 }, "tick": { "fixed_dt": 0.5 } }"#,
        )
        .unwrap();
        let tick_loop = config.build(World::new());
        assert_eq!(tick_loop.fixed_dt(), 0.5);
        assert_eq!(tick_loop.server().tracker.config().max_depth, 8);
    }
}
