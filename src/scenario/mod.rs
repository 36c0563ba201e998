//! Scenario documents and the recording, matching, and archive machinery
//! built on them.

pub mod format;
pub mod har;
pub mod ids;
pub mod recorder;
pub mod replayer;
pub mod sanitize;
pub mod signature;

pub use format::{
    ApiRequest, ApiResponse, Interaction, InteractionKind, InteractionMetadata, InteractionPayload,
    ReplayedResponse, Scenario, ScenarioSummary, ScenarioType, Statistics,
};
pub use recorder::{RecordingOptions, ScenarioRecorder};
pub use replayer::{ExhaustedPolicy, ReplayOptions, ScenarioReplayer};
pub use signature::RequestSignature;
