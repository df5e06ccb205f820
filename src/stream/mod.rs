//! Stream module
//!
//! - `entry`: the persisted, caller-supplied definition of a stream
//! - `record`: a live stream with its runner slot and status

pub mod entry;
pub mod record;

pub use entry::StreamEntry;
pub use record::{Stream, StreamStatus};
