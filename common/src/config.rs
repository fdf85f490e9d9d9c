use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub product: ProductConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub esg: EsgConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// `ffmpeg` (local capture device) or `mjpeg` (HTTP multipart stream).
    #[serde(default = "default_camera_source")]
    pub source: String,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_input_format")]
    pub input_format: String,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Stop after this many frames. 0 means no limit.
    #[serde(default)]
    pub frame_limit: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// `stable` or `immediate`.
    #[serde(default = "default_scan_filter")]
    pub filter: String,
    #[serde(default = "default_stable_secs")]
    pub stable_secs: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// `none`, `log` or `snapshot`.
    #[serde(default = "default_display_mode")]
    pub mode: String,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductConfig {
    #[serde(default = "default_product_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryConfig {
    /// TOML file with `[[company]]` entries. The built-in table is used when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EsgConfig {
    #[serde(default = "default_esg_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: default_camera_source(),
            ffmpeg: default_ffmpeg(),
            device: default_device(),
            input_format: default_input_format(),
            fps: default_fps(),
            url: None,
            connect_timeout_secs: default_connect_timeout(),
            frame_limit: 0,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            filter: default_scan_filter(),
            stable_secs: default_stable_secs(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: default_display_mode(),
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            base_url: default_product_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for EsgConfig {
    fn default() -> Self {
        Self {
            base_url: default_esg_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_request_timeout(),
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
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config for a process invocation.
    ///
    /// An explicit path must exist. Without one, `config.toml` in the working
    /// directory is used when present, otherwise built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new("config.toml");
                if fallback.exists() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if Duration::try_from_secs_f64(self.scanner.stable_secs).is_err() {
            return Err(ConfigError::Invalid {
                field: "scanner.stable_secs",
                reason: format!(
                    "must be a non-negative number of seconds, got {}",
                    self.scanner.stable_secs
                ),
            });
        }
        if !(self.camera.fps.is_finite() && self.camera.fps > 0.0) {
            return Err(ConfigError::Invalid {
                field: "camera.fps",
                reason: format!("must be positive, got {}", self.camera.fps),
            });
        }
        if self.camera.source == "mjpeg" && self.camera.url.is_none() {
            return Err(ConfigError::Invalid {
                field: "camera.url",
                reason: "required when camera.source = \"mjpeg\"".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// Default value functions
fn default_camera_source() -> String {
    "ffmpeg".into()
}
fn default_ffmpeg() -> String {
    "ffmpeg".into()
}
fn default_device() -> String {
    "/dev/video0".into()
}
fn default_input_format() -> String {
    "v4l2".into()
}
fn default_fps() -> f64 {
    10.0
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_scan_filter() -> String {
    "stable".into()
}
fn default_stable_secs() -> f64 {
    0.8
}
fn default_display_mode() -> String {
    "none".into()
}
fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("snapshots")
}
fn default_product_base_url() -> String {
    "https://world.openfoodfacts.org".into()
}
fn default_esg_base_url() -> String {
    "https://query2.finance.yahoo.com".into()
}
fn default_user_agent() -> String {
    concat!("greenscan/", env!("CARGO_PKG_VERSION")).into()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.camera.source, "ffmpeg");
        assert_eq!(config.camera.device, "/dev/video0");
        assert_eq!(config.scanner.filter, "stable");
        assert!((config.scanner.stable_secs - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.display.mode, "none");
        assert_eq!(config.product.base_url, "https://world.openfoodfacts.org");
        assert!(config.directory.path.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: Config = toml::from_str(
            r#"
            [camera]
            source = "mjpeg"
            url = "http://10.0.0.5:8080/video"

            [scanner]
            stable_secs = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.source, "mjpeg");
        assert_eq!(config.camera.url.as_deref(), Some("http://10.0.0.5:8080/video"));
        assert_eq!(config.camera.frame_limit, 0);
        assert!((config.scanner.stable_secs - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.scanner.filter, "stable");
        config.validate().unwrap();
    }

    #[test]
    fn mjpeg_without_url_is_rejected() {
        let config: Config = toml::from_str("[camera]\nsource = \"mjpeg\"\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "camera.url", .. }));
    }

    #[test]
    fn negative_stable_duration_is_rejected() {
        let config: Config = toml::from_str("[scanner]\nstable_secs = -1.0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unrepresentable_stable_duration_is_rejected() {
        for value in ["1e20", "inf", "nan"] {
            let config: Config =
                toml::from_str(&format!("[scanner]\nstable_secs = {value}\n")).unwrap();
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { field: "scanner.stable_secs", .. }),
                "{value} accepted"
            );
        }
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::resolve(Some(Path::new("/nonexistent/greenscan.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile(..)));
    }
}
