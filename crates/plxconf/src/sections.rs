//! Configuration sections. Every field has a compiled default so a missing
//! file (or a partial one) still yields a usable configuration.

use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// Entity pose graph tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Samples kept per time-sampled property before the oldest is evicted.
    /// Default: 10
    #[serde(default = "ContextConfig::default_max_samples")]
    pub max_samples: usize,

    /// Squared distance (meters²) the user may drift from the local origin
    /// before it is recentered.
    /// Default: 25,000,000 (5 km)
    #[serde(default = "ContextConfig::default_local_origin_threshold")]
    pub local_origin_threshold: f64,

    /// Store entity poses as time-sampled series instead of constants.
    /// Default: false
    #[serde(default)]
    pub sample_poses: bool,
}

impl ContextConfig {
    fn default_max_samples() -> usize {
        10
    }

    fn default_local_origin_threshold() -> f64 {
        25_000_000.0
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_samples: Self::default_max_samples(),
            local_origin_threshold: Self::default_local_origin_threshold(),
            sample_poses: false,
        }
    }
}

/// Reality loading configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealityConfig {
    /// Interval between frames produced by the built-in empty reality.
    /// Default: 16 ms
    #[serde(default = "RealityConfig::default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Reality installed when the manager starts.
    /// Default: reality:empty
    #[serde(default = "RealityConfig::default_uri")]
    pub default_uri: String,
}

impl RealityConfig {
    fn default_frame_interval_ms() -> u64 {
        16
    }

    fn default_uri() -> String {
        "reality:empty".to_string()
    }
}

impl Default for RealityConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: Self::default_frame_interval_ms(),
            default_uri: Self::default_uri(),
        }
    }
}

/// Tracking hardware configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VuforiaConfig {
    /// License key handed to the delegate when an application does not
    /// supply one.
    #[serde(default)]
    pub license_key: Option<String>,
}
