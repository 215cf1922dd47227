use super::auth::{AuthGate, AuthOutcome};
use super::page::PageHandler;
use super::request::{read_request, ReadError, Request};
use super::response::Response;
use super::stream::{SessionLimiter, StreamSession};
use crate::common::config::ServerConfig;
use crate::core::{FrameStore, ShutdownFlag};
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

pub const STREAM_PATH: &str = "/video_feed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Unauthorized,
    Stream,
    Page,
}

/// Per-connection dispatch: auth first, then stream or page.
#[derive(Clone)]
pub struct Router {
    gate: AuthGate,
    store: FrameStore,
    shutdown: ShutdownFlag,
    page: PageHandler,
    limiter: SessionLimiter,
    config: ServerConfig,
}

impl Router {
    pub fn new(
        gate: AuthGate,
        store: FrameStore,
        shutdown: ShutdownFlag,
        page: PageHandler,
        config: ServerConfig,
    ) -> Self {
        let limiter = SessionLimiter::new(config.max_stream_sessions);
        Self { gate, store, shutdown, page, limiter, config }
    }

    pub fn route(&self, request: &Request) -> Route {
        if self.gate.check(request.authorization()) != AuthOutcome::Authorized {
            return Route::Unauthorized;
        }
        if request.path().starts_with(STREAM_PATH) {
            Route::Stream
        } else {
            Route::Page
        }
    }

    pub fn active_streams(&self) -> usize {
        self.limiter.active()
    }

    /// Serves one connection to completion. The socket is closed on return.
    pub fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        let request = {
            let mut reader = BufReader::new(&stream);
            read_request(&mut reader, self.config.max_request_bytes)
        };

        let request = match request {
            Ok(request) => request,
            Err(ReadError::TooLarge(limit)) => {
                tracing::debug!("{}: request head over {} bytes", peer, limit);
                self.reply(&stream, peer, Response::header_too_large());
                return;
            }
            Err(ReadError::Malformed(reason)) => {
                tracing::debug!("{}: {}", peer, reason);
                self.reply(&stream, peer, Response::bad_request());
                return;
            }
            Err(e) => {
                tracing::debug!("{}: dropped ({})", peer, e);
                return;
            }
        };

        tracing::debug!("{} {} {}", peer, request.method, request.target);

        match self.route(&request) {
            Route::Unauthorized => {
                self.reply(&stream, peer, Response::unauthorized(&self.config.realm));
            }
            Route::Page => {
                self.reply(&stream, peer, self.page.respond());
            }
            Route::Stream => self.stream(stream, peer),
        }
    }

    fn stream(&self, mut stream: TcpStream, peer: SocketAddr) {
        let _permit = match self.limiter.try_acquire() {
            Some(permit) => permit,
            None => {
                tracing::warn!(
                    "{}: stream rejected, {} sessions already active",
                    peer,
                    self.limiter.active()
                );
                self.reply(&stream, peer, Response::busy());
                return;
            }
        };

        tracing::info!("{}: stream session started", peer);
        let mut session = StreamSession::new(
            self.store.clone(),
            self.shutdown.clone(),
            self.config.frame_interval(),
            self.config.poll_interval(),
        );
        let summary = session.run(&mut stream);
        tracing::info!(
            "{}: stream session closed after {} frames ({:?})",
            peer,
            summary.parts_sent,
            summary.reason
        );
    }

    fn reply(&self, mut stream: &TcpStream, peer: SocketAddr, response: Response) {
        if let Err(e) = response.write_to(&mut stream) {
            tracing::debug!("{}: failed to send {}: {}", peer, response.status(), e);
        }
        let _ = stream.flush();
        let _ = stream.shutdown(Shutdown::Write);
    }
}
