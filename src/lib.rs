//! Record/replay harness for service tests.
//!
//! A [`Harness`] captures API, database, and external-service interactions
//! while a service runs, sanitizes them, and persists them as immutable
//! scenario documents. A later test run replays a scenario, answering live
//! requests with the recorded responses, and the [`RegressionRunner`]
//! drives whole catalogs of scenarios against a running service.

pub mod adapters;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod ports;
pub mod regression;
pub mod scenario;
pub mod session;
pub mod store;

use clap::Parser;

pub use config::HarnessConfig;
pub use context::HarnessContext;
pub use error::{HarnessError, Result};
pub use regression::{RegressionOptions, RegressionReport, RegressionRunner, ScenarioResult};
pub use scenario::{
    ApiRequest, ApiResponse, ExhaustedPolicy, Interaction, InteractionKind, InteractionMetadata,
    RecordingOptions, ReplayOptions, ReplayedResponse, RequestSignature, Scenario, ScenarioSummary,
    ScenarioType,
};
pub use session::{Harness, HarnessStatus, RecordingSummary, ReplaySummary, SessionState};
pub use store::ScenarioStore;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> std::result::Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    commands::dispatch(&cli)
}
