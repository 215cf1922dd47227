use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::common::error::{WatchpostError, Result};
use crate::common::paths;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    /// 999 auto-detects the first capture-capable device
    #[serde(default)]
    pub device_index: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_width() -> u32 { 640 }
fn default_height() -> u32 { 480 }
fn default_fps() -> u32 { 15 }
fn default_jpeg_quality() -> u8 { 70 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    #[serde(default = "default_realm")]
    pub realm: String,
    /// Pause between two parts of one MJPEG stream
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
    /// Retry delay while no frame has been published yet
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
    /// 0 disables the cap
    #[serde(default = "default_max_stream_sessions")]
    pub max_stream_sessions: usize,
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

fn default_bind_address() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_backlog() -> i32 { 5 }
fn default_realm() -> String { "RPi Security".to_string() }
fn default_frame_interval() -> u64 { 100 }
fn default_poll_interval() -> u64 { 10 }
fn default_read_timeout() -> u64 { 10 }
fn default_write_timeout() -> u64 { 5 }
fn default_max_stream_sessions() -> usize { 16 }
fn default_max_request_bytes() -> usize { 16 * 1024 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            backlog: default_backlog(),
            realm: default_realm(),
            frame_interval_ms: default_frame_interval(),
            poll_interval_ms: default_poll_interval(),
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
            max_stream_sessions: default_max_stream_sessions(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthBackend {
    File,
    Pam,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_backend")]
    pub backend: AuthBackend,
    #[serde(default = "paths::system_users_file")]
    pub users_file: PathBuf,
    #[serde(default = "default_pam_service")]
    pub pam_service: String,
}

fn default_backend() -> AuthBackend { AuthBackend::File }
fn default_pam_service() -> String { "login".to_string() }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            users_file: paths::system_users_file(),
            pam_service: default_pam_service(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default = "paths::default_event_log")]
    pub log_path: PathBuf,
    #[serde(default = "default_every_n_frames")]
    pub every_n_frames: u64,
}

fn default_every_n_frames() -> u64 { 30 }

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            log_path: paths::default_event_log(),
            every_n_frames: default_every_n_frames(),
        }
    }
}

impl Config {
    /// System config first, then the local one, then built-in defaults
    pub fn load() -> Result<Self> {
        for candidate in [paths::system_config_file(), paths::local_config_file()] {
            if candidate.exists() {
                return Self::load_from_path(&candidate);
            }
        }
        tracing::info!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WatchpostError::Config(format!(
                "Config file not found: {}", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| WatchpostError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.width > 4096 {
            return Err(WatchpostError::Config(format!(
                "Camera width must be between 1 and 4096, got {}", self.camera.width
            )));
        }
        if self.camera.height == 0 || self.camera.height > 4096 {
            return Err(WatchpostError::Config(format!(
                "Camera height must be between 1 and 4096, got {}", self.camera.height
            )));
        }
        if self.camera.fps == 0 || self.camera.fps > 120 {
            return Err(WatchpostError::Config(format!(
                "Camera fps must be between 1 and 120, got {}", self.camera.fps
            )));
        }
        if self.camera.jpeg_quality == 0 || self.camera.jpeg_quality > 100 {
            return Err(WatchpostError::Config(format!(
                "JPEG quality must be between 1 and 100, got {}", self.camera.jpeg_quality
            )));
        }

        if self.server.frame_interval_ms == 0 || self.server.frame_interval_ms > 10_000 {
            return Err(WatchpostError::Config(format!(
                "Frame interval must be between 1 and 10000 ms, got {}",
                self.server.frame_interval_ms
            )));
        }
        if self.server.read_timeout_secs == 0 || self.server.write_timeout_secs == 0 {
            return Err(WatchpostError::Config(format!(
                "Socket timeouts must be at least 1 s, got read={} write={}",
                self.server.read_timeout_secs, self.server.write_timeout_secs
            )));
        }
        if self.server.backlog < 1 {
            return Err(WatchpostError::Config(format!(
                "Listen backlog must be at least 1, got {}", self.server.backlog
            )));
        }
        if self.server.realm.is_empty() || self.server.realm.contains('"') {
            return Err(WatchpostError::Config(
                "Realm must be non-empty and must not contain '\"'".into()
            ));
        }
        if self.server.max_request_bytes < 256 {
            return Err(WatchpostError::Config(format!(
                "max_request_bytes must be at least 256, got {}",
                self.server.max_request_bytes
            )));
        }

        if self.events.every_n_frames == 0 {
            return Err(WatchpostError::Config(
                "events.every_n_frames must be at least 1".into()
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.frame_interval(), Duration::from_millis(100));
        assert_eq!(config.camera.jpeg_quality, 70);
        assert_eq!(config.auth.backend, AuthBackend::File);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9090
            realm = "Garage"

            [auth]
            backend = "pam"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.realm, "Garage");
        assert_eq!(config.server.backlog, 5);
        assert_eq!(config.auth.backend, AuthBackend::Pam);
        assert_eq!(config.auth.pam_service, "login");
        assert_eq!(config.camera.width, 640);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = Config::from_toml("[camera]\njpeg_quality = 0\n").unwrap_err();
        assert!(err.to_string().contains("JPEG quality"));

        let err = Config::from_toml("[server]\nrealm = 'a\"b'\n").unwrap_err();
        assert!(err.to_string().contains("Realm"));
    }

    #[test]
    fn zero_socket_timeouts_are_rejected() {
        for toml in ["[server]\nread_timeout_secs = 0\n", "[server]\nwrite_timeout_secs = 0\n"] {
            let err = Config::from_toml(toml).unwrap_err();
            assert!(err.to_string().contains("Socket timeouts"), "{}", toml);
        }
        let config = Config::from_toml("[server]\nread_timeout_secs = 1\nwrite_timeout_secs = 1\n").unwrap();
        assert_eq!(config.server.read_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from_path(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, WatchpostError::Config(_)));
    }
}
