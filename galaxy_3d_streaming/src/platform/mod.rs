//! Platform capabilities consumed by the streaming core
//!
//! The core never opens files or spawns work on its own: both are injected.

pub mod file_io;
pub mod jobs;

pub use file_io::{FileHandle, FileIo, StdFileIo, MemoryFileIo};
pub use jobs::{Job, JobQueue, ThreadPool, ImmediateJobQueue, DeferredJobQueue};
