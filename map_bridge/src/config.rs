use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BUILTIN_BRIDGE_CONFIG: &str = include_str!("data/bridge_config.json");
pub const BRIDGE_CONFIG_ENV: &str = "MAP_BRIDGE_CONFIG_PATH";

/// Per-view bridge settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BridgeConfig {
    /// Physical pixels per logical pixel.
    pub pixel_density: f64,
    /// Whether draggable features can be dragged.
    pub drag_enabled: bool,
    /// Style loaded once the map is ready.
    pub initial_style: String,
    /// Locale used by `map#matchMapLanguageWithDeviceDefault`.
    pub default_locale: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            pixel_density: 1.0,
            drag_enabled: true,
            initial_style: "mapbox://styles/mapbox/streets-v11".to_string(),
            default_locale: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse bridge config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read bridge config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid pixel density {0}")]
    InvalidDensity(f64),
}

impl BridgeConfig {
    /// The embedded copy; falls back to the defaults if it fails to parse.
    pub fn builtin() -> Self {
        match Self::from_json_str(BUILTIN_BRIDGE_CONFIG) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(
                    target: "map_bridge::config",
                    error = %err,
                    "bridge_config.builtin_invalid"
                );
                Self::default()
            }
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        BridgeConfig::from_json_str(&contents)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if !self.pixel_density.is_finite() || self.pixel_density <= 0.0 {
            return Err(ConfigError::InvalidDensity(self.pixel_density));
        }
        Ok(self)
    }
}

/// Where the active config came from; `None` means the builtin copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfigMetadata {
    path: Option<PathBuf>,
}

impl BridgeConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Loads the file named by `MAP_BRIDGE_CONFIG_PATH`, falling back to the
/// builtin config when the variable is unset or the file is unusable.
pub fn load_bridge_config_from_env() -> (BridgeConfig, BridgeConfigMetadata) {
    let override_path = env::var(BRIDGE_CONFIG_ENV).ok().map(PathBuf::from);
    if let Some(path) = override_path {
        return load_bridge_config(&path);
    }
    tracing::info!(
        target: "map_bridge::config",
        "bridge_config.loaded=builtin"
    );
    (BridgeConfig::builtin(), BridgeConfigMetadata::new(None))
}

/// Loads `path`, falling back to the builtin config on failure.
pub fn load_bridge_config(path: &Path) -> (BridgeConfig, BridgeConfigMetadata) {
    match BridgeConfig::from_file(path) {
        Ok(config) => {
            tracing::info!(
                target: "map_bridge::config",
                path = %path.display(),
                "bridge_config.loaded=file"
            );
            (config, BridgeConfigMetadata::new(Some(path.to_path_buf())))
        }
        Err(err) => {
            tracing::warn!(
                target: "map_bridge::config",
                path = %path.display(),
                error = %err,
                "bridge_config.load_failed"
            );
            tracing::info!(
                target: "map_bridge::config",
                "bridge_config.loaded=builtin"
            );
            (BridgeConfig::builtin(), BridgeConfigMetadata::new(None))
        }
    }
}

pub fn bridge_config_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(BridgeConfig)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matches_defaults() {
        assert_eq!(BridgeConfig::builtin(), BridgeConfig::default());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = BridgeConfig::from_json_str(r#"{"pixel_density": 2.5}"#).unwrap();
        assert_eq!(config.pixel_density, 2.5);
        assert!(config.drag_enabled);
        assert_eq!(config.default_locale, None);
    }

    #[test]
    fn non_positive_density_is_rejected() {
        let err = BridgeConfig::from_json_str(r#"{"pixel_density": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDensity(_)));
    }

    #[test]
    fn unreadable_file_falls_back_to_builtin() {
        let (config, metadata) = load_bridge_config(Path::new("/nonexistent/bridge_config.json"));
        assert_eq!(config, BridgeConfig::builtin());
        assert!(metadata.path().is_none());
    }

    #[test]
    fn schema_lists_every_field() {
        let schema = serde_json::to_value(bridge_config_schema()).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        for field in [
            "pixel_density",
            "drag_enabled",
            "initial_style",
            "default_locale",
        ] {
            assert!(properties.contains_key(field), "missing {field}");
        }
    }
}
