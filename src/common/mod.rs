pub mod config;
pub mod dev_mode;
pub mod error;
pub mod paths;

pub use config::{Config, AuthBackend};
pub use dev_mode::DevMode;
pub use error::{WatchpostError, Result};
