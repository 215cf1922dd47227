//! HTTP front end: Basic-auth gate, MJPEG stream and status page.

pub mod auth;
pub mod page;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod stream;

pub use auth::{AuthGate, AuthOutcome, Credentials};
pub use page::PageHandler;
pub use request::{read_request, ReadError, Request};
pub use response::Response;
pub use router::{Route, Router};
pub use server::WebServer;
pub use stream::{SessionLimiter, SessionPermit, SessionState, StreamSession, StreamSummary};
