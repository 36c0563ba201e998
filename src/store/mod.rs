//! Scenario store: persistence layer for scenario documents.
//!
//! All I/O goes through the `FileSystem` port. Directory layout:
//!
//! ```text
//! <scenarios_root>/
//!   ├── regression/<id>.json
//!   ├── integration/<id>.json
//!   └── performance/<id>.json
//! <recordings_root>/
//!   ├── api/ database/ external/        (reserved for raw exports)
//!   ├── <id>.har
//!   └── regression-report-<stamp>.json
//! ```
//!
//! Documents are written once and never modified.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::ports::filesystem::FileSystem;
use crate::scenario::format::{InteractionKind, Scenario, ScenarioSummary, ScenarioType};
use crate::scenario::har::{self, HarDocument};
use crate::scenario::recorder::RecordingOptions;

const SCENARIO_EXT: &str = ".json";
const HAR_EXT: &str = ".har";

/// Locations written by [`ScenarioStore::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPaths {
    /// Native scenario document.
    pub scenario: PathBuf,
    /// HTTP-archive export, when one was written.
    pub archive: Option<PathBuf>,
}

/// Persistence layer for scenarios with an in-memory index of known ids.
pub struct ScenarioStore {
    fs: Box<dyn FileSystem>,
    scenarios_root: PathBuf,
    recordings_root: PathBuf,
    index: HashMap<String, PathBuf>,
    resident: HashMap<String, Arc<Scenario>>,
}

impl ScenarioStore {
    /// Opens a store, creating the directory layout and indexing every
    /// scenario document already on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout cannot be created or a directory
    /// cannot be listed.
    pub fn open(fs: Box<dyn FileSystem>, config: &HarnessConfig) -> Result<Self> {
        let mut store = Self {
            fs,
            scenarios_root: config.scenarios_root.clone(),
            recordings_root: config.recordings_root.clone(),
            index: HashMap::new(),
            resident: HashMap::new(),
        };
        store.ensure_layout()?;
        store.refresh_index()?;
        Ok(store)
    }

    /// The filesystem the store writes through.
    #[must_use]
    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Root directory of archive exports and reports.
    #[must_use]
    pub fn recordings_root(&self) -> &Path {
        &self.recordings_root
    }

    /// Number of indexed scenarios.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if no scenario is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns `true` if the id is indexed.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Returns `true` if the id is indexed or a document for it exists
    /// under any type directory.
    #[must_use]
    pub fn is_taken(&self, id: &str) -> bool {
        self.contains(id)
            || ScenarioType::ALL.iter().any(|ty| self.fs.exists(&self.scenario_path(*ty, id)))
    }

    /// `base` if no scenario uses it yet, otherwise the first free
    /// `base-2`, `base-3`, ...
    #[must_use]
    pub fn unique_id(&self, base: &str) -> String {
        if !self.is_taken(base) {
            return base.to_string();
        }
        let mut ordinal = 2;
        loop {
            let candidate = format!("{base}-{ordinal}");
            if !self.is_taken(&candidate) {
                return candidate;
            }
            ordinal += 1;
        }
    }

    fn ensure_layout(&self) -> Result<()> {
        let dirs = ScenarioType::ALL
            .iter()
            .map(|ty| self.scenarios_root.join(ty.as_str()))
            .chain(InteractionKind::ALL.iter().map(|k| self.recordings_root.join(k.as_str())));
        for dir in dirs {
            self.fs.create_dir_all(&dir).map_err(|e| HarnessError::persistence(&dir, e))?;
        }
        Ok(())
    }

    /// Re-scans the type directories and indexes any new documents.
    ///
    /// # Errors
    ///
    /// Returns an error if a type directory cannot be listed.
    pub fn refresh_index(&mut self) -> Result<()> {
        for ty in ScenarioType::ALL {
            let dir = self.scenarios_root.join(ty.as_str());
            if !self.fs.exists(&dir) {
                continue;
            }
            let names = self.fs.list_dir(&dir).map_err(|e| HarnessError::persistence(&dir, e))?;
            for name in names {
                if let Some(id) = name.strip_suffix(SCENARIO_EXT) {
                    self.index.entry(id.to_string()).or_insert_with(|| dir.join(&name));
                }
            }
        }
        debug!(count = self.index.len(), "scenario index refreshed");
        Ok(())
    }

    /// Path of the native document for a scenario.
    #[must_use]
    pub fn scenario_path(&self, scenario_type: ScenarioType, id: &str) -> PathBuf {
        self.scenarios_root.join(scenario_type.as_str()).join(format!("{id}{SCENARIO_EXT}"))
    }

    /// Path of the archive export for a scenario.
    #[must_use]
    pub fn archive_path(&self, id: &str) -> PathBuf {
        self.recordings_root.join(format!("{id}{HAR_EXT}"))
    }

    /// Writes a completed scenario and registers it in the index.
    ///
    /// The index is only updated once every requested document is written,
    /// and the native document is written last, so a failed save can be
    /// retried with the same scenario.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ScenarioExists`] if the id is indexed or
    /// already has a document on disk, or a persistence error if a document
    /// cannot be written.
    pub fn save(&mut self, scenario: &Scenario, export_archive: bool) -> Result<SavedPaths> {
        if self.is_taken(&scenario.id) {
            return Err(HarnessError::ScenarioExists(scenario.id.clone()));
        }

        // Native document last: its presence is what marks the id as taken.
        let archive = if export_archive {
            let archive_path = self.archive_path(&scenario.id);
            write_json(self.fs.as_ref(), &archive_path, &har::export(scenario))?;
            Some(archive_path)
        } else {
            None
        };

        let path = self.scenario_path(scenario.scenario_type, &scenario.id);
        write_json(self.fs.as_ref(), &path, scenario)?;

        self.index.insert(scenario.id.clone(), path.clone());
        self.resident.insert(scenario.id.clone(), Arc::new(scenario.clone()));
        info!(scenario_id = %scenario.id, path = %path.display(), "scenario saved");
        Ok(SavedPaths { scenario: path, archive })
    }

    fn locate(&self, id: &str) -> Option<PathBuf> {
        if !is_valid_id(id) {
            return None;
        }
        self.index.get(id).cloned().or_else(|| {
            ScenarioType::ALL
                .iter()
                .map(|ty| self.scenario_path(*ty, id))
                .find(|path| self.fs.exists(path))
        })
    }

    /// Loads a scenario, reading it from storage unless already resident.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ScenarioNotFound`] if the id is malformed or
    /// no document exists for it, or an error if the document cannot be
    /// read or parsed.
    pub fn load(&mut self, id: &str) -> Result<Arc<Scenario>> {
        if !is_valid_id(id) {
            return Err(HarnessError::ScenarioNotFound(id.to_string()));
        }
        if let Some(scenario) = self.resident.get(id) {
            return Ok(Arc::clone(scenario));
        }

        let path = self.locate(id).ok_or_else(|| HarnessError::ScenarioNotFound(id.to_string()))?;
        let content = self.fs.read_to_string(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                HarnessError::ScenarioNotFound(id.to_string())
            } else {
                HarnessError::persistence(&path, e)
            }
        })?;
        let scenario: Scenario =
            serde_json::from_str(&content).map_err(|e| HarnessError::serialization(&path, e))?;

        debug!(scenario_id = %id, path = %path.display(), "scenario loaded");
        let scenario = Arc::new(scenario);
        self.index.insert(id.to_string(), path);
        self.resident.insert(id.to_string(), Arc::clone(&scenario));
        Ok(scenario)
    }

    /// Lists catalog entries, optionally restricted to one scenario type.
    ///
    /// Unreadable documents are skipped with a warning. Entries are sorted
    /// by creation time, then id.
    ///
    /// # Errors
    ///
    /// Returns an error if the type directories cannot be listed.
    pub fn list(&mut self, filter: Option<ScenarioType>) -> Result<Vec<ScenarioSummary>> {
        self.refresh_index()?;
        let mut ids: Vec<String> = self.index.keys().cloned().collect();
        ids.sort();

        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load(&id) {
                Ok(scenario) => {
                    if filter.map_or(true, |ty| ty == scenario.scenario_type) {
                        summaries.push(scenario.summary());
                    }
                }
                Err(err) => warn!(scenario_id = %id, error = %err, "skipping unreadable scenario"),
            }
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }

    /// Removes a scenario's native document, its archive export if present,
    /// and its index entry.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ScenarioNotFound`] if the id is unknown or
    /// malformed, or a persistence error if a document cannot be removed.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let path = self.locate(id).ok_or_else(|| HarnessError::ScenarioNotFound(id.to_string()))?;
        self.fs.remove_file(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                HarnessError::ScenarioNotFound(id.to_string())
            } else {
                HarnessError::persistence(&path, e)
            }
        })?;

        let archive = self.archive_path(id);
        if self.fs.exists(&archive) {
            self.fs.remove_file(&archive).map_err(|e| HarnessError::persistence(&archive, e))?;
        }

        self.index.remove(id);
        self.resident.remove(id);
        info!(scenario_id = %id, "scenario deleted");
        Ok(())
    }

    /// Writes (or rewrites) the archive export of a stored scenario.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario cannot be loaded or the archive
    /// cannot be written.
    pub fn export_archive(&mut self, id: &str) -> Result<PathBuf> {
        let scenario = self.load(id)?;
        let path = self.archive_path(id);
        write_json(self.fs.as_ref(), &path, &har::export(&scenario))?;
        Ok(path)
    }

    /// Reads an archive document and stores it as a new scenario.
    ///
    /// `now` stands in for the creation time of an archive with no entries.
    /// Importing the same archive twice yields two scenarios with distinct
    /// ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be read or parsed, or the
    /// resulting scenario cannot be saved.
    pub fn import_archive(
        &mut self,
        path: &Path,
        name: &str,
        options: RecordingOptions,
        now: DateTime<Utc>,
    ) -> Result<Arc<Scenario>> {
        let content = self.fs.read_to_string(path).map_err(|e| HarnessError::persistence(path, e))?;
        let document: HarDocument = serde_json::from_str(&content)
            .map_err(|e| HarnessError::Archive(format!("{}: {e}", path.display())))?;
        let mut scenario = har::import(&document, name, options, now);
        scenario.id = self.unique_id(&scenario.id);
        self.save(&scenario, false)?;
        self.load(&scenario.id)
    }

    /// Writes a regression report under the recordings root.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be serialized or written.
    pub fn save_report<T: Serialize>(&self, stamp: &str, report: &T) -> Result<PathBuf> {
        let path = self.recordings_root.join(format!("regression-report-{stamp}.json"));
        write_json(self.fs.as_ref(), &path, report)?;
        Ok(path)
    }
}

/// Scenario ids are file stems: ASCII letters, digits, `-` and `_` only.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn write_json<T: Serialize + ?Sized>(fs: &dyn FileSystem, path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| HarnessError::serialization(path, e))?;
    if let Some(parent) = path.parent() {
        fs.create_dir_all(parent).map_err(|e| HarnessError::persistence(parent, e))?;
    }
    fs.write(path, &json).map_err(|e| HarnessError::persistence(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryFileSystem;
    use crate::scenario::format::{ApiRequest, ApiResponse, InteractionMetadata};
    use crate::scenario::recorder::ScenarioRecorder;
    use chrono::Duration;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-15T14:30:00Z").unwrap().with_timezone(&Utc)
    }

    fn config() -> HarnessConfig {
        HarnessConfig::rooted_at("/h")
    }

    fn open(fs: &Arc<MemoryFileSystem>) -> ScenarioStore {
        ScenarioStore::open(Box::new(Arc::clone(fs)), &config()).unwrap()
    }

    fn scenario(name: &str, scenario_type: ScenarioType, offset_ms: i64) -> Scenario {
        let options = RecordingOptions { scenario_type, ..RecordingOptions::default() };
        let start = t0() + Duration::milliseconds(offset_ms);
        let mut recorder = ScenarioRecorder::new(name, options, start);
        recorder.record_api(
            &ApiRequest::new("GET", "/widgets").with_header("Authorization", "Bearer secret123"),
            &ApiResponse::new(200, json!({"count": 0})),
            InteractionMetadata::default(),
            start,
        );
        recorder.snapshot(start + Duration::milliseconds(5))
    }

    #[test]
    fn open_creates_layout() {
        let fs = Arc::new(MemoryFileSystem::new());
        let store = open(&fs);
        assert!(store.is_empty());
        assert!(fs.exists(Path::new("/h/scenarios/performance")));
        assert!(fs.exists(Path::new("/h/recordings/external")));
    }

    #[test]
    fn save_writes_under_type_directory_and_loads_back() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut store = open(&fs);
        let s = scenario("checkout", ScenarioType::Integration, 0);

        let paths = store.save(&s, false).unwrap();
        assert_eq!(paths.scenario, PathBuf::from(format!("/h/scenarios/integration/{}.json", s.id)));
        assert!(paths.archive.is_none());

        // A fresh store must find it on disk through the index.
        let mut reopened = open(&fs);
        assert!(reopened.contains(&s.id));
        assert_eq!(*reopened.load(&s.id).unwrap(), s);
    }

    #[test]
    fn saved_scenarios_are_immutable() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut store = open(&fs);
        let s = scenario("once", ScenarioType::Regression, 0);
        store.save(&s, false).unwrap();
        assert!(matches!(store.save(&s, false), Err(HarnessError::ScenarioExists(_))));
    }

    #[test]
    fn save_refuses_documents_written_by_another_store() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut first = open(&fs);
        let mut second = open(&fs);
        let s = scenario("shared", ScenarioType::Regression, 0);

        first.save(&s, false).unwrap();
        assert!(!second.contains(&s.id));
        assert!(matches!(second.save(&s, false), Err(HarnessError::ScenarioExists(id)) if id == s.id));
    }

    #[test]
    fn unique_id_appends_first_free_ordinal() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut store = open(&fs);
        let s = scenario("taken", ScenarioType::Regression, 0);
        assert_eq!(store.unique_id(&s.id), s.id);

        store.save(&s, false).unwrap();
        fs.write(&store.scenario_path(ScenarioType::Performance, &format!("{}-2", s.id)), "{}").unwrap();
        assert!(store.is_taken(&s.id));
        assert_eq!(store.unique_id(&s.id), format!("{}-3", s.id));
    }

    #[test]
    fn path_like_ids_are_not_found() {
        let fs = Arc::new(MemoryFileSystem::new());
        let outside = Path::new("/outside.json");
        fs.write(outside, "{}").unwrap();
        fs.write(Path::new("/h/scenarios/regression/a.b.json"), "{}").unwrap();
        let mut store = open(&fs);

        for id in ["../../outside", "..", "regression/../x", "a\\b", "a.b", ""] {
            assert!(matches!(store.delete(id), Err(HarnessError::ScenarioNotFound(_))), "{id}");
            assert!(matches!(store.load(id), Err(HarnessError::ScenarioNotFound(_))), "{id}");
        }
        assert!(fs.exists(outside));
    }

    #[test]
    fn repeated_loads_are_identical() {
        let fs = Arc::new(MemoryFileSystem::new());
        let s = scenario("stable", ScenarioType::Regression, 0);
        open(&fs).save(&s, false).unwrap();

        let mut store = open(&fs);
        let first = store.load(&s.id).unwrap();
        let second = store.load(&s.id).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            fs.read_to_string(&store.scenario_path(ScenarioType::Regression, &s.id)).unwrap(),
            serde_json::to_string_pretty(&s).unwrap()
        );
    }

    #[test]
    fn archive_export_is_sanitized() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut store = open(&fs);
        let s = scenario("har", ScenarioType::Regression, 0);
        let paths = store.save(&s, true).unwrap();

        let archive = fs.read_to_string(&paths.archive.unwrap()).unwrap();
        let native = fs.read_to_string(&paths.scenario).unwrap();
        for doc in [&archive, &native] {
            assert!(!doc.contains("secret123"));
            assert!(doc.contains("[REDACTED]"));
        }
    }

    #[test]
    fn list_filters_by_type_and_sorts_by_creation() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut store = open(&fs);
        store.save(&scenario("late", ScenarioType::Regression, 1_000), false).unwrap();
        store.save(&scenario("early", ScenarioType::Regression, 0), false).unwrap();
        store.save(&scenario("perf", ScenarioType::Performance, 500), false).unwrap();

        let all = store.list(None).unwrap();
        assert_eq!(all.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), ["early", "perf", "late"]);

        let regression = store.list(Some(ScenarioType::Regression)).unwrap();
        assert_eq!(regression.len(), 2);
        assert_eq!(regression[0].interaction_count, 1);
    }

    #[test]
    fn list_skips_corrupt_documents() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.write(Path::new("/h/scenarios/regression/broken.json"), "{not json").unwrap();
        let mut store = open(&fs);
        store.save(&scenario("ok", ScenarioType::Regression, 0), false).unwrap();

        let listed = store.list(None).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(matches!(store.load("broken"), Err(HarnessError::Serialization { .. })));
    }

    #[test]
    fn delete_removes_documents_and_index_entry() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut store = open(&fs);
        let s = scenario("doomed", ScenarioType::Regression, 0);
        let paths = store.save(&s, true).unwrap();

        store.delete(&s.id).unwrap();
        assert!(!fs.exists(&paths.scenario));
        assert!(!fs.exists(&paths.archive.unwrap()));
        assert!(!store.contains(&s.id));
        assert!(matches!(store.load(&s.id), Err(HarnessError::ScenarioNotFound(_))));
        assert!(matches!(store.delete(&s.id), Err(HarnessError::ScenarioNotFound(_))));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut store = open(&fs);
        assert!(matches!(store.load("ghost"), Err(HarnessError::ScenarioNotFound(id)) if id == "ghost"));
    }

    #[test]
    fn failed_write_leaves_index_untouched() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut store = open(&fs);
        let s = scenario("flaky", ScenarioType::Regression, 0);

        fs.set_read_only(true);
        assert!(matches!(store.save(&s, false), Err(HarnessError::Persistence { .. })));
        assert!(!store.contains(&s.id));

        fs.set_read_only(false);
        assert!(store.save(&s, false).is_ok());
    }

    #[test]
    fn archive_import_creates_scenario() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut store = open(&fs);
        let s = scenario("source", ScenarioType::Regression, 0);
        let paths = store.save(&s, true).unwrap();

        let options =
            RecordingOptions { scenario_type: ScenarioType::Integration, ..RecordingOptions::default() };
        let archive = paths.archive.unwrap();
        let imported = store.import_archive(&archive, "copy", options.clone(), t0()).unwrap();
        assert_eq!(imported.scenario_type, ScenarioType::Integration);
        assert_eq!(imported.interactions.len(), 1);
        assert!(store.contains(&imported.id));

        let again = store.import_archive(&archive, "copy", options, t0()).unwrap();
        assert_eq!(again.id, format!("{}-2", imported.id));
    }

    #[test]
    fn report_is_written_under_recordings_root() {
        let fs = Arc::new(MemoryFileSystem::new());
        let store = open(&fs);
        let path = store.save_report("20250315T143000Z", &json!({"total": 0})).unwrap();
        assert_eq!(path, PathBuf::from("/h/recordings/regression-report-20250315T143000Z.json"));
        assert!(fs.exists(&path));
    }
}
