//! System-under-test port used by regression runs.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::scenario::format::{Interaction, ReplayedResponse};

/// Boxed future type alias used by [`ScenarioExecutor`] to keep the trait dyn-compatible.
pub type ExecuteFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<ReplayedResponse>>> + Send + 'a>>;

/// Drives one recorded interaction against the system under test.
///
/// The harness does not know how to invoke the system under test; callers
/// supply this hook to the regression runner.
pub trait ScenarioExecutor: Send + Sync {
    /// Re-issues the interaction's request and returns the actual response.
    ///
    /// Returns `Ok(None)` when this executor does not handle the
    /// interaction's kind; such interactions are skipped, not failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the system under test could not be invoked.
    fn execute<'a>(&'a self, interaction: &'a Interaction) -> ExecuteFuture<'a>;
}
