//! In-process adapters for tests and dry runs.

pub mod clock;
pub mod filesystem;

pub use clock::ManualClock;
pub use filesystem::MemoryFileSystem;
