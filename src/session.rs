//! The harness: session state machine over the recorder, replayer, and store.
//!
//! Exactly one recording or one replay may be active at a time. The session
//! lives behind a mutex owned by the [`Harness`] instance, so the
//! check-then-set in every `start_*` call is atomic and separate harness
//! instances (one per test worker, say) never share state.
//!
//! Lock order is session, then store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::context::HarnessContext;
use crate::error::{HarnessError, Result};
use crate::ports::clock::Clock;
use crate::ports::tracer::Tracer;
use crate::scenario::format::{
    ApiRequest, ApiResponse, Interaction, InteractionKind, InteractionMetadata, ReplayedResponse,
    Scenario, ScenarioSummary, ScenarioType,
};
use crate::scenario::recorder::{RecordingOptions, ScenarioRecorder};
use crate::scenario::replayer::{ReplayOptions, ScenarioReplayer};
use crate::scenario::signature::RequestSignature;
use crate::store::ScenarioStore;

/// Which kind of session, if any, is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session.
    Idle,
    /// A scenario is being recorded.
    Recording,
    /// A scenario is loaded for replay.
    Replaying,
}

impl SessionState {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Replaying => "replaying",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

enum Session {
    Idle,
    Recording(ScenarioRecorder),
    Replaying { replayer: ScenarioReplayer, started_at: DateTime<Utc> },
}

impl Session {
    const fn state(&self) -> SessionState {
        match self {
            Self::Idle => SessionState::Idle,
            Self::Recording(_) => SessionState::Recording,
            Self::Replaying { .. } => SessionState::Replaying,
        }
    }

    fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Idle => None,
            Self::Recording(recorder) => Some(recorder.started_at()),
            Self::Replaying { started_at, .. } => Some(*started_at),
        }
    }
}

/// Result of a successful `stop_recording`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    /// Identifier of the persisted scenario.
    pub scenario_id: String,
    /// Scenario duration in milliseconds.
    pub duration: u64,
    /// Number of recorded interactions.
    pub interaction_count: usize,
    /// Path of the native scenario document.
    pub storage_path: PathBuf,
    /// Path of the HTTP-archive export, when one was written.
    pub har_path: Option<PathBuf>,
}

/// Result of `stop_replay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    /// Identifier of the replayed scenario.
    pub scenario_id: String,
    /// Lookups answered with a recorded response.
    pub served: usize,
    /// Lookups that found no match.
    pub unmatched: usize,
    /// Recorded interactions never served.
    pub remaining: usize,
}

/// Snapshot of the harness's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarnessStatus {
    /// Active session kind.
    pub state: SessionState,
    /// Scenario being recorded or replayed.
    pub scenario_id: Option<String>,
    /// When the active session started.
    pub started_at: Option<DateTime<Utc>>,
    /// Interactions buffered (recording) or loaded (replaying).
    pub interaction_count: usize,
}

/// Record/replay harness instance.
pub struct Harness {
    config: HarnessConfig,
    clock: Box<dyn Clock>,
    tracer: Box<dyn Tracer>,
    store: Mutex<ScenarioStore>,
    session: Mutex<Session>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Harness {
    /// Builds a harness from injected collaborators, opening the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store layout cannot be created or indexed.
    pub fn new(ctx: HarnessContext, config: HarnessConfig) -> Result<Self> {
        let HarnessContext { clock, fs, tracer } = ctx;
        let store = ScenarioStore::open(fs, &config)?;
        Ok(Self { config, clock, tracer, store: Mutex::new(store), session: Mutex::new(Session::Idle) })
    }

    /// Configuration the harness was built with.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Current time from the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Force-stops a stale session when the watchdog is configured, or
    /// rejects the start with `SessionConflict`.
    fn ensure_idle(&self, session: &mut Session) -> Result<()> {
        let active = session.state();
        if active == SessionState::Idle {
            return Ok(());
        }

        let now = self.clock.now();
        let stale = match (self.config.session_timeout, session.started_at()) {
            (Some(timeout), Some(started_at)) => {
                (now - started_at).to_std().is_ok_and(|age| age > timeout)
            }
            _ => false,
        };
        if !stale {
            return Err(HarnessError::SessionConflict { active });
        }

        warn!(state = %active, "force-stopping stale session");
        match std::mem::replace(session, Session::Idle) {
            Session::Recording(mut recorder) => {
                if let Err(err) = self.persist(&mut recorder, now) {
                    *session = Session::Recording(recorder);
                    return Err(err);
                }
            }
            Session::Replaying { .. } | Session::Idle => {}
        }
        Ok(())
    }

    /// Starts a recording session and returns the new scenario's id.
    ///
    /// The id is unique among stored scenarios; when the derived id is
    /// taken an ordinal suffix is appended.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SessionConflict`] if a session is active.
    pub fn start_recording(&self, name: &str, options: RecordingOptions) -> Result<String> {
        let mut session = lock(&self.session);
        self.ensure_idle(&mut session)?;

        let mut recorder = ScenarioRecorder::new(name, options, self.clock.now());
        let id = lock(&self.store).unique_id(recorder.scenario_id());
        recorder.reassign_id(id.clone());
        info!(scenario_id = %id, name, "recording started");
        *session = Session::Recording(recorder);
        Ok(id)
    }

    fn record_with<F>(&self, kind: InteractionKind, duration_ms: Option<u64>, record: F) -> Option<String>
    where
        F: FnOnce(&mut ScenarioRecorder, DateTime<Utc>) -> String,
    {
        let mut session = lock(&self.session);
        let Session::Recording(recorder) = &mut *session else {
            return None;
        };

        let mut span = self.tracer.begin_span("harness.record", &[("kind", kind.to_string())]);
        let id = record(recorder, self.clock.now());
        span.set_attribute("interaction_id", id.clone());
        if let Some(ms) = duration_ms {
            span.set_attribute("duration_ms", ms.to_string());
        }
        span.end();

        debug!(interaction_id = %id, %kind, "interaction recorded");
        Some(id)
    }

    /// Records an API exchange. Returns `None` when no recording is active.
    pub fn record_api_interaction(
        &self,
        request: &ApiRequest,
        response: &ApiResponse,
        metadata: InteractionMetadata,
    ) -> Option<String> {
        self.record_with(InteractionKind::Api, metadata.duration_ms, |recorder, now| {
            recorder.record_api(request, response, metadata, now)
        })
    }

    /// Records a database operation. Returns `None` when no recording is active.
    pub fn record_database_interaction(
        &self,
        operation: &str,
        query: &str,
        parameters: &[Value],
        result: &Value,
        metadata: InteractionMetadata,
    ) -> Option<String> {
        self.record_with(InteractionKind::Database, metadata.duration_ms, |recorder, now| {
            recorder.record_database(operation, query, parameters, result, metadata, now)
        })
    }

    /// Records an external service call. Returns `None` when no recording is active.
    pub fn record_external_interaction(
        &self,
        service: &str,
        endpoint: &str,
        request: &Value,
        response: &Value,
        metadata: InteractionMetadata,
    ) -> Option<String> {
        self.record_with(InteractionKind::External, metadata.duration_ms, |recorder, now| {
            recorder.record_external(service, endpoint, request, response, metadata, now)
        })
    }

    fn persist(&self, recorder: &mut ScenarioRecorder, now: DateTime<Utc>) -> Result<RecordingSummary> {
        let mut store = lock(&self.store);
        if store.is_taken(recorder.scenario_id()) {
            let fresh = store.unique_id(recorder.scenario_id());
            warn!(scenario_id = %recorder.scenario_id(), reassigned = %fresh, "scenario id taken since start");
            recorder.reassign_id(fresh);
        }
        let scenario = recorder.snapshot(now);
        let export = recorder.options().export_har.unwrap_or(self.config.export_har);
        let paths = store.save(&scenario, export)?;
        drop(store);
        info!(
            scenario_id = %scenario.id,
            interactions = scenario.interactions.len(),
            duration_ms = scenario.duration,
            "recording stopped"
        );
        Ok(RecordingSummary {
            scenario_id: scenario.id,
            duration: scenario.duration,
            interaction_count: scenario.interactions.len(),
            storage_path: paths.scenario,
            har_path: paths.archive,
        })
    }

    /// Freezes and persists the active recording, then returns to idle.
    ///
    /// If another writer stored a scenario under the same id since
    /// recording started, the recording is saved under the next free id,
    /// reported in the summary. If persisting fails the session stays in
    /// `recording` with its buffer intact, so the call can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NoActiveSession`] if no recording is active,
    /// or a persistence error if the scenario cannot be written.
    pub fn stop_recording(&self) -> Result<RecordingSummary> {
        let mut session = lock(&self.session);
        let Session::Recording(recorder) = &mut *session else {
            return Err(HarnessError::NoActiveSession { expected: SessionState::Recording });
        };
        let summary = self.persist(recorder, self.clock.now())?;
        *session = Session::Idle;
        Ok(summary)
    }

    /// Loads a stored scenario for replay.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SessionConflict`] if a session is active, or
    /// [`HarnessError::ScenarioNotFound`] if the scenario does not exist.
    pub fn start_replay(&self, scenario_id: &str, options: ReplayOptions) -> Result<()> {
        let mut session = lock(&self.session);
        self.ensure_idle(&mut session)?;

        let scenario = lock(&self.store).load(scenario_id)?;
        info!(scenario_id, interactions = scenario.interactions.len(), "replay started");
        *session = Session::Replaying {
            replayer: ScenarioReplayer::new(scenario, options),
            started_at: self.clock.now(),
        };
        Ok(())
    }

    /// Returns the recorded response for a live request, if one matches.
    ///
    /// An unmatched request is not an error: it yields `Ok(None)` and a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NoActiveSession`] if no replay is active.
    pub fn get_replay_response(&self, signature: &RequestSignature) -> Result<Option<ReplayedResponse>> {
        let mut session = lock(&self.session);
        let Session::Replaying { replayer, .. } = &mut *session else {
            return Err(HarnessError::NoActiveSession { expected: SessionState::Replaying });
        };

        let kind = signature.kind();
        let mut span = self.tracer.begin_span("harness.replay", &[("kind", kind.to_string())]);
        let matched = replayer.next_match(signature).map(|interaction| (interaction.id.clone(), interaction.response()));
        span.set_attribute("matched", matched.is_some().to_string());
        if let Some((id, _)) = &matched {
            span.set_attribute("interaction_id", id.clone());
        }
        span.end();

        match matched {
            Some((id, response)) => {
                debug!(interaction_id = %id, %kind, "replay matched");
                Ok(Some(response))
            }
            None => {
                warn!(%kind, signature = %signature, "no recorded interaction matches request");
                Ok(None)
            }
        }
    }

    /// Exact lookup of a recorded interaction by id during replay.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NoActiveSession`] if no replay is active.
    pub fn replay_interaction(&self, interaction_id: &str) -> Result<Option<Interaction>> {
        let session = lock(&self.session);
        let Session::Replaying { replayer, .. } = &*session else {
            return Err(HarnessError::NoActiveSession { expected: SessionState::Replaying });
        };
        Ok(replayer.by_id(interaction_id).cloned())
    }

    /// Discards the loaded scenario and returns to idle.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NoActiveSession`] if no replay is active.
    pub fn stop_replay(&self) -> Result<ReplaySummary> {
        let mut session = lock(&self.session);
        let replayer = match std::mem::replace(&mut *session, Session::Idle) {
            Session::Replaying { replayer, .. } => replayer,
            other => {
                *session = other;
                return Err(HarnessError::NoActiveSession { expected: SessionState::Replaying });
            }
        };

        let summary = ReplaySummary {
            scenario_id: replayer.scenario().id.clone(),
            served: replayer.served(),
            unmatched: replayer.unmatched(),
            remaining: replayer.remaining(),
        };
        info!(
            scenario_id = %summary.scenario_id,
            served = summary.served,
            unmatched = summary.unmatched,
            "replay stopped"
        );
        Ok(summary)
    }

    /// Current session snapshot.
    #[must_use]
    pub fn status(&self) -> HarnessStatus {
        let session = lock(&self.session);
        let (scenario_id, interaction_count) = match &*session {
            Session::Idle => (None, 0),
            Session::Recording(recorder) => (Some(recorder.scenario_id().to_string()), recorder.len()),
            Session::Replaying { replayer, .. } => {
                let scenario = replayer.scenario();
                (Some(scenario.id.clone()), scenario.interactions.len())
            }
        };
        HarnessStatus { state: session.state(), scenario_id, started_at: session.started_at(), interaction_count }
    }

    /// Catalog entries, optionally restricted to one scenario type.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be scanned.
    pub fn list_scenarios(&self, filter: Option<ScenarioType>) -> Result<Vec<ScenarioSummary>> {
        lock(&self.store).list(filter)
    }

    /// Loads a stored scenario.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ScenarioNotFound`] if it does not exist.
    pub fn load_scenario(&self, scenario_id: &str) -> Result<Arc<Scenario>> {
        lock(&self.store).load(scenario_id)
    }

    /// Deletes a stored scenario and its archive export.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ScenarioNotFound`] if it does not exist.
    pub fn delete_scenario(&self, scenario_id: &str) -> Result<()> {
        lock(&self.store).delete(scenario_id)
    }

    /// Writes the HTTP-archive export of a stored scenario.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario cannot be loaded or written.
    pub fn export_archive(&self, scenario_id: &str) -> Result<PathBuf> {
        lock(&self.store).export_archive(scenario_id)
    }

    /// Imports an HTTP-archive document as a new scenario.
    ///
    /// An archive with no entries is stamped with the harness clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be read, parsed, or stored.
    pub fn import_archive(&self, path: &Path, name: &str, options: RecordingOptions) -> Result<Arc<Scenario>> {
        let now = self.clock.now();
        lock(&self.store).import_archive(path, name, options, now)
    }

    /// Writes a report document under the recordings root.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be written.
    pub fn save_report<T: Serialize>(&self, stamp: &str, report: &T) -> Result<PathBuf> {
        lock(&self.store).save_report(stamp, report)
    }
}
