use crate::camera::{encode_jpeg, FrameSource};
use crate::core::event_log::EventLog;
use crate::core::frame_store::FrameStore;
use crate::core::shutdown::ShutdownFlag;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new frame of this many bytes is in the store
    Published(usize),
    CaptureFailed,
    EncodeFailed,
}

/// Capture, encode and publish loop. Publishes as fast as the source delivers.
pub struct FrameProducer<S: FrameSource> {
    source: S,
    store: FrameStore,
    events: Option<EventLog>,
    jpeg_quality: u8,
    frame_count: u64,
}

impl<S: FrameSource> FrameProducer<S> {
    pub fn new(source: S, store: FrameStore, jpeg_quality: u8) -> Self {
        Self {
            source,
            store,
            events: None,
            jpeg_quality,
            frame_count: 0,
        }
    }

    pub fn with_event_log(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn run_cycle(&mut self) -> CycleOutcome {
        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Failed to capture frame: {}", e);
                return CycleOutcome::CaptureFailed;
            }
        };
        self.frame_count += 1;

        if let Some(events) = &self.events {
            if let Err(e) = events.record(self.frame_count, &frame.identities) {
                tracing::warn!("Failed to write event log {}: {}", events.path().display(), e);
            }
        }

        // on failure the store keeps serving the previous frame
        match encode_jpeg(&frame.image, self.jpeg_quality) {
            Ok(jpeg) => {
                let len = jpeg.len();
                self.store.publish(jpeg);
                tracing::trace!("Published frame {} ({} bytes)", self.frame_count, len);
                CycleOutcome::Published(len)
            }
            Err(e) => {
                tracing::warn!("Failed to encode frame {}: {}", self.frame_count, e);
                CycleOutcome::EncodeFailed
            }
        }
    }

    pub fn run(&mut self, shutdown: &ShutdownFlag) {
        tracing::info!("Capture loop started");
        while !shutdown.is_triggered() {
            if self.run_cycle() == CycleOutcome::CaptureFailed {
                thread::sleep(CAPTURE_RETRY_DELAY);
            }
        }
        tracing::info!("Capture loop stopped after {} frames", self.frame_count);
    }
}

impl<S: FrameSource + 'static> FrameProducer<S> {
    pub fn spawn(mut self, shutdown: ShutdownFlag) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("frame-producer".into())
            .spawn(move || self.run(&shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CapturedFrame, TestPattern};
    use crate::common::{WatchpostError, Result};
    use image::{DynamicImage, RgbImage};
    use std::collections::VecDeque;

    struct Scripted(VecDeque<Result<CapturedFrame>>);

    impl FrameSource for Scripted {
        fn next_frame(&mut self) -> Result<CapturedFrame> {
            self.0.pop_front()
                .unwrap_or_else(|| Err(WatchpostError::Camera("script exhausted".into())))
        }
    }

    fn frame(names: &[&str]) -> Result<CapturedFrame> {
        let image = DynamicImage::ImageRgb8(RgbImage::new(16, 16));
        Ok(CapturedFrame::with_identities(image, names.iter().map(|n| n.to_string()).collect()))
    }

    #[test]
    fn capture_failure_keeps_previous_frame() {
        let store = FrameStore::new();
        let script = Scripted(VecDeque::from(vec![
            frame(&[]),
            Err(WatchpostError::Camera("unplugged".into())),
        ]));
        let mut producer = FrameProducer::new(script, store.clone(), 70);

        assert!(matches!(producer.run_cycle(), CycleOutcome::Published(_)));
        let first = store.snapshot().unwrap();

        assert_eq!(producer.run_cycle(), CycleOutcome::CaptureFailed);
        assert_eq!(store.snapshot().unwrap(), first);
        assert_eq!(producer.frame_count(), 1);
    }

    #[test]
    fn identities_reach_the_event_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path().join("events.csv"), 2);
        let script = Scripted(VecDeque::from(vec![frame(&["Ana"]), frame(&["Ana", "Luis"])]));
        let mut producer = FrameProducer::new(script, FrameStore::new(), 70)
            .with_event_log(log.clone());

        producer.run_cycle();
        producer.run_cycle();

        let text = log.read_text();
        assert_eq!(text.lines().count(), 1);
        assert!(text.trim_end().ends_with(",2,Ana; Luis"));
    }

    #[test]
    fn spawned_loop_stops_on_shutdown() {
        let store = FrameStore::new();
        let shutdown = ShutdownFlag::new();
        let producer = FrameProducer::new(TestPattern::new(32, 24, 100), store.clone(), 60);
        let handle = producer.spawn(shutdown.clone()).unwrap();

        while store.snapshot().is_none() {
            thread::sleep(Duration::from_millis(5));
        }
        shutdown.trigger();
        handle.join().unwrap();

        let jpeg = store.snapshot().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
}
