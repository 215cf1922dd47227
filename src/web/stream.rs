//! MJPEG streaming over a single connection.
//!
//! The session walks `HeaderSent -> Streaming -> Closed`. Each iteration
//! takes a snapshot of the frame store, writes one multipart part and then
//! sleeps for the frame interval, so outbound rate is fixed no matter how
//! fast the producer publishes. A failed write is the only disconnect signal.

use crate::core::{FrameStore, ShutdownFlag};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const BOUNDARY: &str = "frame";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    HeaderSent,
    Streaming,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientGone,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub parts_sent: u64,
    pub reason: CloseReason,
}

pub struct StreamSession {
    store: FrameStore,
    shutdown: ShutdownFlag,
    frame_interval: Duration,
    poll_interval: Duration,
    state: SessionState,
}

impl StreamSession {
    pub fn new(
        store: FrameStore,
        shutdown: ShutdownFlag,
        frame_interval: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            shutdown,
            frame_interval,
            poll_interval,
            state: SessionState::HeaderSent,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn run<W: Write>(&mut self, out: &mut W) -> StreamSummary {
        self.state = SessionState::HeaderSent;
        if write_stream_head(out).is_err() {
            self.state = SessionState::Closed;
            return StreamSummary { parts_sent: 0, reason: CloseReason::ClientGone };
        }

        let mut parts_sent = 0u64;
        let reason = loop {
            self.state = SessionState::Streaming;
            if self.shutdown.is_triggered() {
                break CloseReason::Shutdown;
            }

            // no frame yet is not an error, keep the client waiting
            let frame = match self.store.snapshot() {
                Some(frame) => frame,
                None => {
                    thread::sleep(self.poll_interval);
                    continue;
                }
            };

            if let Err(e) = write_part(out, &frame) {
                tracing::debug!("Stream write failed after {} parts: {}", parts_sent, e);
                break CloseReason::ClientGone;
            }
            parts_sent += 1;

            thread::sleep(self.frame_interval);
        };

        self.state = SessionState::Closed;
        StreamSummary { parts_sent, reason }
    }
}

fn write_stream_head<W: Write>(out: &mut W) -> io::Result<()> {
    let head = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: multipart/x-mixed-replace; boundary={}\r\n\
         Cache-Control: no-cache\r\n\
         Connection: close\r\n\r\n",
        BOUNDARY
    );
    out.write_all(head.as_bytes())?;
    out.flush()
}

pub fn part_header(len: usize) -> String {
    format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY, len
    )
}

/// Boundary + headers, image bytes, trailing CRLF, as three separate writes.
fn write_part<W: Write>(out: &mut W, jpeg: &[u8]) -> io::Result<()> {
    out.write_all(part_header(jpeg.len()).as_bytes())?;
    out.write_all(jpeg)?;
    out.write_all(b"\r\n")?;
    out.flush()
}

/// Caps the number of concurrent stream sessions. A limit of 0 means no cap.
#[derive(Clone, Debug)]
pub struct SessionLimiter {
    active: Arc<AtomicUsize>,
    max: usize,
}

impl SessionLimiter {
    pub fn new(max: usize) -> Self {
        Self { active: Arc::new(AtomicUsize::new(0)), max }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn try_acquire(&self) -> Option<SessionPermit> {
        let max = self.max;
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if max == 0 || n < max { Some(n + 1) } else { None }
            })
            .ok()?;
        Some(SessionPermit { active: self.active.clone() })
    }
}

/// Releases its slot on drop.
#[derive(Debug)]
pub struct SessionPermit {
    active: Arc<AtomicUsize>,
}

impl Drop for SessionPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
