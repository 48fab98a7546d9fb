//! In-memory sample storage.

pub mod pressure_log;
pub mod ring_buffer;

pub use pressure_log::{DEFAULT_LOG_CAPACITY, POINTS_PER_MINUTE, PressureLog};
pub use ring_buffer::RingBuffer;
