use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Optional capture-record database. Absent means records are dropped.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_camera_kind")]
    pub kind: String,
    /// Snapshot endpoint returning one JPEG per GET (kind = "http").
    #[serde(default = "default_camera_url")]
    pub url: String,
    /// Directory of still images to replay (kind = "replay").
    #[serde(default = "default_replay_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: f64,
    /// Upper bound on one snapshot request, connect to last body byte.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_pixel_diff_threshold")]
    pub pixel_diff_threshold: u8,
    #[serde(default = "default_blur_kernel")]
    pub blur_kernel: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_movement_threshold")]
    pub movement_threshold: f64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            kind: default_camera_kind(),
            url: default_camera_url(),
            directory: default_replay_dir(),
            width: default_width(),
            height: default_height(),
            warmup_secs: default_warmup_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            pixel_diff_threshold: default_pixel_diff_threshold(),
            blur_kernel: default_blur_kernel(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            movement_threshold: default_movement_threshold(),
            output_dir: default_output_dir(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::from_toml(&content)
    }

    /// Load `path` if it exists, otherwise fall back to built-in defaults.
    /// The second element is false when the defaults were used.
    pub fn load_or_default(path: &Path) -> Result<(Self, bool), ConfigError> {
        if path.exists() {
            Ok((Self::load(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let kernel = self.detector.blur_kernel;
        if kernel == 0 || kernel % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "detector.blur_kernel must be odd and positive, got {kernel}"
            )));
        }
        if self.capture.interval()?.is_zero() {
            return Err(ConfigError::Invalid(format!(
                "capture.interval_secs must be positive, got {}",
                self.capture.interval_secs
            )));
        }
        let threshold = self.persistence.movement_threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "persistence.movement_threshold must be within 0..=100, got {threshold}"
            )));
        }
        let quality = self.persistence.jpeg_quality;
        if !(1..=100).contains(&quality) {
            return Err(ConfigError::Invalid(format!(
                "persistence.jpeg_quality must be within 1..=100, got {quality}"
            )));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "camera resolution must be non-zero, got {}x{}",
                self.camera.width, self.camera.height
            )));
        }
        self.camera.warmup()?;
        if self.camera.request_timeout()?.is_zero() {
            return Err(ConfigError::Invalid(format!(
                "camera.request_timeout_secs must be positive, got {}",
                self.camera.request_timeout_secs
            )));
        }
        Ok(())
    }
}

impl CameraConfig {
    pub fn warmup(&self) -> Result<Duration, ConfigError> {
        seconds("camera.warmup_secs", self.warmup_secs)
    }

    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        seconds("camera.request_timeout_secs", self.request_timeout_secs)
    }
}

impl CaptureConfig {
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        seconds("capture.interval_secs", self.interval_secs)
    }
}

/// Negative, non-finite and out-of-range values have no `Duration`.
fn seconds(field: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        ConfigError::Invalid(format!(
            "{field} must be a non-negative number of seconds, got {value}"
        ))
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_camera_kind() -> String {
    "http".into()
}
fn default_camera_url() -> String {
    "http://127.0.0.1:8080/frame".into()
}
fn default_replay_dir() -> PathBuf {
    PathBuf::from("replay")
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_warmup_secs() -> f64 {
    2.0
}
fn default_request_timeout_secs() -> f64 {
    10.0
}
fn default_interval_secs() -> f64 {
    0.5
}
fn default_pixel_diff_threshold() -> u8 {
    25
}
fn default_blur_kernel() -> u32 {
    21
}
fn default_movement_threshold() -> f64 {
    25.0
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("frames")
}
fn default_jpeg_quality() -> u8 {
    90
}
fn default_log_level() -> String {
    "info".into()
}
