//! Configuration management for the surface agent.
//!
//! Configuration can be set via environment variables:
//! - `GEMINI_API_KEY` - Required. API key for the action-inference service.
//! - `INFERENCE_MODEL` - Optional. Model identifier. Defaults to `gemini-2.5-computer-use-preview-10-2025`.
//! - `INFERENCE_API_URL` - Optional. Base URL of the inference API.
//! - `INFERENCE_TIMEOUT_SECS` - Optional. Per-request timeout. Defaults to `120`.
//! - `MAX_ROUNDS` - Optional. Maximum inference rounds per session. Defaults to `10`.
//! - `SETTLE_DELAY_MS` - Optional. Pause after each dispatched action. Defaults to `500`.
//! - `DESKTOP_DISPLAY` - Optional. X11 display to drive. Defaults to `:99`.
//! - `DESKTOP_RESOLUTION` - Optional. Surface size as `WIDTHxHEIGHT`. Defaults to `1280x720`.
//! - `SNAPSHOT_JPEG_QUALITY` - Optional. JPEG quality for snapshots (1-100). Defaults to `85`.
//! - `SNAPSHOT_DIR` - Optional. Where snapshot files are written.
//! - `KEEP_SNAPSHOTS` - Optional. Keep snapshot files after they are read. Defaults to `false`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::surface::SurfaceDimensions;
use crate::util::env_var_bool;

pub const DEFAULT_MODEL: &str = "gemini-2.5-computer-use-preview-10-2025";
pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MAX_ROUNDS: u32 = 10;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Inference service connection settings.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// API key for the inference service
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Base URL (without the `models/...` suffix)
    pub api_url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

/// Controlled-surface settings.
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    /// X11 display identifier (e.g. `:99`)
    pub display: String,

    /// Physical surface size in pixels
    pub dimensions: SurfaceDimensions,

    /// JPEG quality used for snapshots
    pub jpeg_quality: u8,

    /// Directory where snapshot files are written
    pub snapshot_dir: PathBuf,

    /// Keep snapshot files on disk after reading them
    pub keep_snapshots: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            display: ":99".to_string(),
            dimensions: SurfaceDimensions::new(1280, 720),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            snapshot_dir: std::env::temp_dir().join("surface-agent"),
            keep_snapshots: false,
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Inference service settings
    pub inference: InferenceConfig,

    /// Maximum inference rounds per session
    pub max_rounds: u32,

    /// Pause after each dispatched action before re-observing the surface
    pub settle_delay: Duration,

    /// Controlled-surface settings
    pub surface: SurfaceConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GEMINI_API_KEY` is not set, and
    /// `ConfigError::InvalidValue` for any variable that fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let model = std::env::var("INFERENCE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let api_url = std::env::var("INFERENCE_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let timeout_secs: u64 = parse_env("INFERENCE_TIMEOUT_SECS", 120)?;

        let max_rounds: u32 = parse_env("MAX_ROUNDS", DEFAULT_MAX_ROUNDS)?;
        if max_rounds == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ROUNDS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let settle_ms: u64 = parse_env("SETTLE_DELAY_MS", DEFAULT_SETTLE_DELAY.as_millis() as u64)?;

        let defaults = SurfaceConfig::default();
        let display = std::env::var("DESKTOP_DISPLAY").unwrap_or(defaults.display);

        let dimensions = match std::env::var("DESKTOP_RESOLUTION") {
            Ok(raw) => parse_resolution(&raw).ok_or_else(|| {
                ConfigError::InvalidValue("DESKTOP_RESOLUTION".to_string(), raw.clone())
            })?,
            Err(_) => defaults.dimensions,
        };

        let jpeg_quality: u8 = parse_env("SNAPSHOT_JPEG_QUALITY", DEFAULT_JPEG_QUALITY)?;
        if !(1..=100).contains(&jpeg_quality) {
            return Err(ConfigError::InvalidValue(
                "SNAPSHOT_JPEG_QUALITY".to_string(),
                format!("{} is outside 1-100", jpeg_quality),
            ));
        }

        let snapshot_dir = std::env::var("SNAPSHOT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.snapshot_dir);

        Ok(Self {
            inference: InferenceConfig {
                api_key,
                model,
                api_url,
                timeout: Duration::from_secs(timeout_secs),
            },
            max_rounds,
            settle_delay: Duration::from_millis(settle_ms),
            surface: SurfaceConfig {
                display,
                dimensions,
                jpeg_quality,
                snapshot_dir,
                keep_snapshots: env_var_bool("KEEP_SNAPSHOTS", false),
            },
        })
    }

    /// Create a config with default values (useful for testing).
    pub fn new(api_key: String) -> Self {
        Self {
            inference: InferenceConfig {
                api_key,
                model: DEFAULT_MODEL.to_string(),
                api_url: DEFAULT_API_URL.to_string(),
                timeout: Duration::from_secs(120),
            },
            max_rounds: DEFAULT_MAX_ROUNDS,
            settle_delay: DEFAULT_SETTLE_DELAY,
            surface: SurfaceConfig::default(),
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

/// Parse a `WIDTHxHEIGHT` resolution string.
pub fn parse_resolution(raw: &str) -> Option<SurfaceDimensions> {
    let (w, h) = raw.trim().split_once(['x', 'X'])?;
    let width = w.trim().parse().ok()?;
    let height = h.trim().parse().ok()?;
    Some(SurfaceDimensions::new(width, height))
}
