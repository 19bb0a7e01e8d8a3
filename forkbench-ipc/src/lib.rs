#![warn(missing_docs)]
//! Forkbench IPC Protocol
//!
//! Wire schema between the scheduler and its one-shot worker processes.
//! The scheduler sends exactly one [`StartMessage`] right after spawning a
//! worker; the worker answers with exactly one [`ExitMessage`] before it
//! exits. Messages are rkyv archives inside length-prefixed frames.

mod framing;
mod messages;
mod options;

pub use framing::{FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE, read_frame, write_frame};
pub use messages::{
    BenchmarkResult, ErrorKind, ExitMessage, ResultStats, StartMessage, WireError,
};
pub use options::BenchmarkOptions;

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Exit code of a worker that reported a result
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code of a worker that reported an error or could not report at all
pub const EXIT_FAILURE: i32 = 1;
