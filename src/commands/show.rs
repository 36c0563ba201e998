//! `scenario-harness show` command.

use crate::cli::OutputFormat;
use crate::scenario::format::Scenario;
use crate::session::Harness;

/// Execute the `show` command.
///
/// Prints the full scenario document in the requested format.
///
/// # Errors
///
/// Returns an error string if the scenario cannot be loaded or rendered.
pub fn run(harness: &Harness, id: &str, format: OutputFormat) -> Result<(), String> {
    let scenario = harness.load_scenario(id).map_err(|e| e.to_string())?;
    println!("{}", render(&scenario, format)?);
    Ok(())
}

fn render(scenario: &Scenario, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(scenario)
            .map_err(|e| format!("Failed to render scenario as JSON: {e}")),
        OutputFormat::Yaml => serde_yaml::to_string(scenario)
            .map(|yaml| yaml.trim_end().to_string())
            .map_err(|e| format!("Failed to render scenario as YAML: {e}")),
    }
}
