use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchpostError {
    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Authentication backend error: {0}")]
    Auth(String),

    #[error("User store error: {0}")]
    UserStore(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WatchpostError>;
