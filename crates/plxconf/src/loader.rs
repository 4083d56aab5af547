//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, PlxConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/parallax/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("parallax/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("parallax.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and layer it over `config`.
pub fn load_into(config: &mut PlxConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Layer a TOML document over `config`. Keys absent from the document keep
/// whatever value `config` already had, so successive files merge key by key.
pub(crate) fn apply_toml(config: &mut PlxConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let invalid = |key: &str, expected: &str| ConfigError::InvalidValue {
        path: path.to_path_buf(),
        key: key.to_string(),
        expected: expected.to_string(),
    };

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level") {
            config.telemetry.log_level = v
                .as_str()
                .ok_or_else(|| invalid("telemetry.log_level", "string"))?
                .to_string();
        }
    }

    if let Some(context) = table.get("context").and_then(|v| v.as_table()) {
        if let Some(v) = context.get("max_samples") {
            let samples = v
                .as_integer()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("context.max_samples", "positive integer"))?;
            config.context.max_samples = samples as usize;
        }
        if let Some(v) = context.get("local_origin_threshold") {
            config.context.local_origin_threshold = v
                .as_float()
                .or_else(|| v.as_integer().map(|n| n as f64))
                .ok_or_else(|| invalid("context.local_origin_threshold", "number"))?;
        }
        if let Some(v) = context.get("sample_poses") {
            config.context.sample_poses = v
                .as_bool()
                .ok_or_else(|| invalid("context.sample_poses", "boolean"))?;
        }
    }

    if let Some(reality) = table.get("reality").and_then(|v| v.as_table()) {
        if let Some(v) = reality.get("frame_interval_ms") {
            let ms = v
                .as_integer()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("reality.frame_interval_ms", "positive integer"))?;
            config.reality.frame_interval_ms = ms as u64;
        }
        if let Some(v) = reality.get("default_uri") {
            config.reality.default_uri = v
                .as_str()
                .ok_or_else(|| invalid("reality.default_uri", "string"))?
                .to_string();
        }
    }

    if let Some(vuforia) = table.get("vuforia").and_then(|v| v.as_table()) {
        if let Some(v) = vuforia.get("license_key") {
            config.vuforia.license_key = Some(
                v.as_str()
                    .ok_or_else(|| invalid("vuforia.license_key", "string"))?
                    .to_string(),
            );
        }
    }

    Ok(())
}

/// Apply environment variable overrides to config.
///
/// Unparseable numeric values are ignored rather than failing the load.
pub fn apply_env_overrides(config: &mut PlxConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("PARALLAX_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("PARALLAX_LOG_LEVEL".to_string());
    }

    if let Ok(v) = env::var("PARALLAX_MAX_SAMPLES") {
        if let Ok(n) = v.parse::<usize>() {
            if n > 0 {
                config.context.max_samples = n;
                sources.env_overrides.push("PARALLAX_MAX_SAMPLES".to_string());
            }
        }
    }
    if let Ok(v) = env::var("PARALLAX_LOCAL_ORIGIN_THRESHOLD") {
        if let Ok(threshold) = v.parse() {
            config.context.local_origin_threshold = threshold;
            sources.env_overrides.push("PARALLAX_LOCAL_ORIGIN_THRESHOLD".to_string());
        }
    }

    if let Ok(v) = env::var("PARALLAX_FRAME_INTERVAL_MS") {
        if let Ok(ms) = v.parse::<u64>() {
            if ms > 0 {
                config.reality.frame_interval_ms = ms;
                sources.env_overrides.push("PARALLAX_FRAME_INTERVAL_MS".to_string());
            }
        }
    }
    if let Ok(v) = env::var("PARALLAX_REALITY") {
        config.reality.default_uri = v;
        sources.env_overrides.push("PARALLAX_REALITY".to_string());
    }

    if let Ok(v) = env::var("PARALLAX_VUFORIA_LICENSE_KEY") {
        config.vuforia.license_key = Some(v);
        sources.env_overrides.push("PARALLAX_VUFORIA_LICENSE_KEY".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_apply_minimal_toml() {
        let mut config = PlxConfig::default();
        let toml = r#"
[context]
max_samples = 4
"#;
        apply_toml(&mut config, toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.context.max_samples, 4);
        // Other values should be defaults
        assert_eq!(config.reality.frame_interval_ms, 16);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_apply_full_toml() {
        let mut config = PlxConfig::default();
        let toml = r#"
[telemetry]
log_level = "debug,plxproto=trace"

[context]
max_samples = 32
local_origin_threshold = 100
sample_poses = true

[reality]
frame_interval_ms = 33
default_uri = "reality:hosted/street"

[vuforia]
license_key = "abc123"
"#;
        apply_toml(&mut config, toml, Path::new("test.toml")).unwrap();

        assert_eq!(config.telemetry.log_level, "debug,plxproto=trace");
        assert_eq!(config.context.max_samples, 32);
        assert_eq!(config.context.local_origin_threshold, 100.0);
        assert!(config.context.sample_poses);
        assert_eq!(config.reality.frame_interval_ms, 33);
        assert_eq!(config.reality.default_uri, "reality:hosted/street");
        assert_eq!(config.vuforia.license_key.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_later_layer_only_overrides_present_keys() {
        let mut config = PlxConfig::default();
        apply_toml(&mut config, "[reality]\nframe_interval_ms = 50\n", Path::new("a.toml")).unwrap();
        apply_toml(&mut config, "[context]\nmax_samples = 3\n", Path::new("b.toml")).unwrap();

        assert_eq!(config.reality.frame_interval_ms, 50);
        assert_eq!(config.context.max_samples, 3);
    }

    #[test]
    fn test_rejects_wrong_types() {
        let mut config = PlxConfig::default();
        let err = apply_toml(&mut config, "[context]\nmax_samples = \"many\"\n", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "context.max_samples"));

        let err = apply_toml(&mut config, "[reality]\nframe_interval_ms = 0\n", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut config = PlxConfig::default();
        let err = apply_toml(&mut config, "[context\n", Path::new("broken.toml")).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, PathBuf::from("broken.toml")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
