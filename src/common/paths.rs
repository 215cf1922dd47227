use std::path::PathBuf;

// Fixed locations for a system install; DevMode swaps these for ./dev_data

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/watchpost/watchpost.toml")
}

pub fn local_config_file() -> PathBuf {
    PathBuf::from("configs/watchpost.toml")
}

pub fn system_users_file() -> PathBuf {
    PathBuf::from("/etc/watchpost/users.toml")
}

pub fn default_event_log() -> PathBuf {
    PathBuf::from("logs/event_log.csv")
}
