//! Single-slot store for the most recently encoded frame.
//!
//! One producer overwrites the slot, any number of stream sessions copy it
//! out. The mutex only ever guards the assignment or the handle copy, so a
//! slow client writing to its socket can never stall the producer.

use bytes::Bytes;
use std::sync::{Arc, Mutex};

/// An immutable JPEG image as published by the producer.
pub type EncodedFrame = Bytes;

#[derive(Clone, Default)]
pub struct FrameStore {
    slot: Arc<Mutex<Option<EncodedFrame>>>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the held frame, whether or not anyone read the previous one.
    pub fn publish(&self, frame: impl Into<EncodedFrame>) {
        let frame = frame.into();
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(frame);
    }

    /// The latest frame, or `None` if nothing has been published yet.
    pub fn snapshot(&self) -> Option<EncodedFrame> {
        let slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.clone()
    }
}

impl std::fmt::Debug for FrameStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.snapshot().map(|frame| frame.len());
        f.debug_struct("FrameStore").field("frame_len", &len).finish()
    }
}
