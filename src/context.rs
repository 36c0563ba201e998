//! Service context bundling the harness's injected collaborators.

use chrono::{DateTime, Utc};

use crate::adapters::live::{LiveClock, LiveFileSystem, LogTracer, NoopTracer};
use crate::adapters::memory::{ManualClock, MemoryFileSystem};
use crate::ports::clock::Clock;
use crate::ports::filesystem::FileSystem;
use crate::ports::tracer::Tracer;

/// Bundles the port trait objects a harness depends on.
///
/// Constructors wire different adapter sets; individual fields can be
/// swapped afterwards (e.g. a test-specific tracer).
pub struct HarnessContext {
    /// Clock for session start times and relative timestamps.
    pub clock: Box<dyn Clock>,
    /// Filesystem for scenario documents, archives, and reports.
    pub fs: Box<dyn FileSystem>,
    /// Observability collaborator receiving spans.
    pub tracer: Box<dyn Tracer>,
}

impl HarnessContext {
    /// Real clock, real disk, spans logged through `tracing`.
    #[must_use]
    pub fn live() -> Self {
        Self { clock: Box::new(LiveClock), fs: Box::new(LiveFileSystem), tracer: Box::new(LogTracer) }
    }

    /// Frozen clock, in-memory filesystem, spans discarded.
    #[must_use]
    pub fn in_memory(start: DateTime<Utc>) -> Self {
        Self {
            clock: Box::new(ManualClock::new(start)),
            fs: Box::new(MemoryFileSystem::new()),
            tracer: Box::new(NoopTracer),
        }
    }

    /// Replaces the tracer.
    #[must_use]
    pub fn with_tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replaces the filesystem.
    #[must_use]
    pub fn with_fs(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Box::new(fs);
        self
    }
}
