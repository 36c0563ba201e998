//! Port traits defining the harness's external boundaries.
//!
//! Each trait is a seam between the harness core and something it must not
//! hard-wire: time, storage, the observability collaborator, and the system
//! under test. Implementations live in `src/adapters/`.

pub mod clock;
pub mod executor;
pub mod filesystem;
pub mod tracer;

pub use clock::Clock;
pub use executor::{ExecuteFuture, ScenarioExecutor};
pub use filesystem::FileSystem;
pub use tracer::{Span, Tracer};
