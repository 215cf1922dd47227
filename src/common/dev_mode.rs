use std::path::PathBuf;
use std::fs;
use crate::common::config::Config;
use crate::common::error::Result;

#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_base_dir(enabled, PathBuf::from("./dev_data"))
    }

    pub fn with_base_dir(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        if enabled {
            fs::create_dir_all(&base_dir)?;
            fs::create_dir_all(base_dir.join("logs"))?;
            fs::create_dir_all(base_dir.join("config"))?;

            tracing::info!("Development mode enabled - data will be saved to: {}",
                     base_dir.display());
        }

        Ok(Self { enabled, base_dir })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn users_file(&self) -> PathBuf {
        self.base_dir.join("config").join("users.toml")
    }

    pub fn event_log(&self) -> PathBuf {
        self.base_dir.join("logs").join("event_log.csv")
    }

    /// Points every on-disk path of `config` into the dev directory
    pub fn apply(&self, config: &mut Config) {
        if !self.enabled {
            return;
        }
        config.auth.users_file = self.users_file();
        config.events.log_path = self.event_log();
        tracing::debug!("Dev paths: users={:?} events={:?}",
            config.auth.users_file, config.events.log_path);
    }
}
