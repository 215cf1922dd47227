pub mod event_log;
pub mod frame_store;
pub mod producer;
pub mod shutdown;

pub use event_log::EventLog;
pub use frame_store::{EncodedFrame, FrameStore};
pub use producer::{CycleOutcome, FrameProducer};
pub use shutdown::ShutdownFlag;
