//! Configuration loading for Parallax.
//!
//! Every Parallax crate depends on this one, so it stays small: a handful of
//! typed sections with compiled defaults, layered from TOML files and
//! `PARALLAX_*` environment variables.
//!
//! # Usage
//!
//! ```rust,no_run
//! use plxconf::PlxConfig;
//!
//! let config = PlxConfig::load().expect("Failed to load config");
//! println!("frame interval: {}ms", config.reality.frame_interval_ms);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, key by key):
//! 1. `/etc/parallax/config.toml` (system)
//! 2. `~/.config/parallax/config.toml` (user)
//! 3. `./parallax.toml` (local override, or the path given on the CLI)
//! 4. Environment variables (`PARALLAX_*`)
//!
//! # Example Config
//!
//! ```toml
//! [telemetry]
//! log_level = "info"
//!
//! [context]
//! max_samples = 10
//! local_origin_threshold = 25000000.0
//! sample_poses = false
//!
//! [reality]
//! frame_interval_ms = 16
//! default_uri = "reality:empty"
//!
//! [vuforia]
//! license_key = "..."
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files, discover_config_files_with_override, ConfigSources};
pub use sections::{ContextConfig, RealityConfig, TelemetryConfig, VuforiaConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key} in {path}: expected {expected}")]
    InvalidValue {
        path: PathBuf,
        key: String,
        expected: String,
    },
}

/// Complete Parallax configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlxConfig {
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub reality: RealityConfig,

    #[serde(default)]
    pub vuforia: VuforiaConfig,
}

impl PlxConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` replacing the local
    /// `./parallax.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = PlxConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::load_into(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Frame interval for the built-in empty reality.
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.reality.frame_interval_ms)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# Parallax Configuration\n\n");

        output.push_str("[telemetry]\n");
        output.push_str(&format!("log_level = {}\n", quoted(&self.telemetry.log_level)));

        output.push_str("\n[context]\n");
        output.push_str(&format!("max_samples = {}\n", self.context.max_samples));
        output.push_str(&format!(
            "local_origin_threshold = {:?}\n",
            self.context.local_origin_threshold
        ));
        output.push_str(&format!("sample_poses = {}\n", self.context.sample_poses));

        output.push_str("\n[reality]\n");
        output.push_str(&format!(
            "frame_interval_ms = {}\n",
            self.reality.frame_interval_ms
        ));
        output.push_str(&format!("default_uri = {}\n", quoted(&self.reality.default_uri)));

        output.push_str("\n[vuforia]\n");
        if let Some(key) = &self.vuforia.license_key {
            output.push_str(&format!("license_key = {}\n", quoted(key)));
        }

        output
    }
}

/// A TOML string literal, escaped.
fn quoted(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PlxConfig::default();
        assert_eq!(config.context.max_samples, 10);
        assert_eq!(config.reality.default_uri, "reality:empty");
        assert!(config.vuforia.license_key.is_none());
    }

    #[test]
    fn test_to_toml_round_trips_through_loader() {
        let mut config = PlxConfig::default();
        config.context.max_samples = 7;
        config.vuforia.license_key = Some("key".to_string());

        let mut reloaded = PlxConfig::default();
        loader::apply_toml(&mut reloaded, &config.to_toml(), Path::new("rendered.toml")).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_to_toml_escapes_strings() {
        let mut config = PlxConfig::default();
        config.reality.default_uri = r#"reality:"quoted"\path"#.to_string();
        config.vuforia.license_key = Some("line\nbreak \\ \"key\"".to_string());

        let rendered = config.to_toml();
        let mut reloaded = PlxConfig::default();
        loader::apply_toml(&mut reloaded, &rendered, Path::new("rendered.toml")).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[reality]\nframe_interval_ms = 40").unwrap();

        let (config, sources) = PlxConfig::load_with_sources_from(Some(file.path())).unwrap();
        assert!(sources.files.iter().any(|p| p == file.path()));
        // PARALLAX_FRAME_INTERVAL_MS would win if set in the environment
        if std::env::var("PARALLAX_FRAME_INTERVAL_MS").is_err() {
            assert_eq!(config.reality.frame_interval_ms, 40);
            assert_eq!(config.frame_interval(), std::time::Duration::from_millis(40));
        }
    }
}
