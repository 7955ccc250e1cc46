//! Test doubles for the browse engine
//!
//! - `MemoryTree`: an in-memory `RemoteTree` with call counters, injectable
//!   failures and artificial latency
//! - `RecordingSurface`: a `ChatSurface` that records every outgoing call
//!
//! Used by unit tests and by the integration tests under `tests/`.

pub mod memory_tree;
pub mod recorder;

pub use memory_tree::MemoryTree;
pub use recorder::{RecordingSurface, SurfaceEvent};
