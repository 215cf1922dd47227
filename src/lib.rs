// Core modules
pub mod common;
pub mod camera;
pub mod core;
pub mod identity;
pub mod storage;
pub mod web;

// Re-export commonly used types
pub use common::{Config, DevMode, WatchpostError, Result};
pub use camera::{Camera, CapturedFrame, FrameSource, TestPattern};
pub use core::{EncodedFrame, EventLog, FrameProducer, FrameStore, ShutdownFlag};
pub use identity::Authenticator;
pub use storage::UserStore;
pub use web::{AuthGate, PageHandler, Router, WebServer};
