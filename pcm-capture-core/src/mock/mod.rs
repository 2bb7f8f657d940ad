//! In-memory backend and sinks for exercising the engine without hardware.

mod backend;
mod sink;

pub use backend::{BackendCall, MockBackend};
pub use sink::{FailingSink, MemorySink};
