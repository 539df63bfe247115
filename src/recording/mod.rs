mod buffer;
pub mod payload;
mod transport;

pub use buffer::{RecordingBuffer, WriteMode};
pub use payload::{ConcatOptions, Payload};
pub use transport::{RecordLock, RecordMode, TimeDisplay, TransportController, TransportState};
