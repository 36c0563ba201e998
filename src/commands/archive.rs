//! `scenario-harness export-har` and `import-har` commands.

use std::path::Path;

use crate::scenario::format::ScenarioType;
use crate::scenario::recorder::RecordingOptions;
use crate::session::Harness;

/// Execute the `export-har` command.
///
/// # Errors
///
/// Returns an error string if the scenario cannot be loaded or the archive
/// cannot be written.
pub fn export(harness: &Harness, id: &str) -> Result<(), String> {
    let path = harness.export_archive(id).map_err(|e| e.to_string())?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Execute the `import-har` command.
///
/// # Errors
///
/// Returns an error string if the archive cannot be read or stored.
pub fn import(harness: &Harness, file: &Path, name: &str, scenario_type: ScenarioType) -> Result<(), String> {
    let options = RecordingOptions {
        description: format!("Imported from {}", file.display()),
        scenario_type,
        ..RecordingOptions::default()
    };
    let scenario = harness.import_archive(file, name, options).map_err(|e| e.to_string())?;
    println!("Imported {} interaction(s) as {}", scenario.interactions.len(), scenario.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::context::HarnessContext;
    use crate::scenario::format::{ApiRequest, ApiResponse, InteractionMetadata};
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn exported_archive_imports_as_new_scenario() {
        let harness =
            Harness::new(HarnessContext::in_memory(Utc::now()), HarnessConfig::rooted_at("/h")).unwrap();
        harness.start_recording("source", RecordingOptions::default()).unwrap();
        harness.record_api_interaction(
            &ApiRequest::new("POST", "/widgets").with_body(json!({"name": "w"})),
            &ApiResponse::new(201, json!({"id": 1})),
            InteractionMetadata::default(),
        );
        let id = harness.stop_recording().unwrap().scenario_id;

        export(&harness, &id).unwrap();
        let archive = harness.config().recordings_root.join(format!("{id}.har"));
        import(&harness, &archive, "copy", ScenarioType::Integration).unwrap();

        let imported = harness.list_scenarios(Some(ScenarioType::Integration)).unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].name, "copy");
        assert_eq!(imported[0].interaction_count, 1);
    }

    #[test]
    fn export_of_unknown_scenario_fails() {
        let harness =
            Harness::new(HarnessContext::in_memory(Utc::now()), HarnessConfig::rooted_at("/h")).unwrap();
        let err = export(&harness, "ghost").unwrap_err();
        assert!(err.contains("ghost"));
    }
}
