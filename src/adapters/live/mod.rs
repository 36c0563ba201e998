//! Live adapters for real external interactions.

pub mod clock;
pub mod filesystem;
pub mod http;
pub mod tracer;

pub use clock::LiveClock;
pub use filesystem::LiveFileSystem;
pub use http::HttpExecutor;
pub use tracer::{LogTracer, NoopTracer};
