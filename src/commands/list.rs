//! `scenario-harness list` command.

use crate::scenario::format::{ScenarioSummary, ScenarioType};
use crate::session::Harness;

/// Execute the `list` command.
///
/// Prints a table of stored scenarios: id, type, interaction count, and name.
///
/// # Errors
///
/// Returns an error string if the catalog cannot be read.
pub fn run(harness: &Harness, filter: Option<ScenarioType>) -> Result<(), String> {
    let summaries = harness.list_scenarios(filter).map_err(|e| e.to_string())?;
    if summaries.is_empty() {
        println!("No scenarios found.");
        return Ok(());
    }
    print!("{}", render_table(&summaries));
    println!("\n{} scenario(s) total.", summaries.len());
    Ok(())
}

fn render_table(summaries: &[ScenarioSummary]) -> String {
    let id_width = summaries.iter().map(|s| s.id.len()).max().unwrap_or(2).max(2);
    let type_width = "integration".len();

    let mut out = format!("{:<id_width$}  {:<type_width$}  {:>12}  NAME\n", "ID", "TYPE", "INTERACTIONS");
    for summary in summaries {
        out.push_str(&format!(
            "{:<id_width$}  {:<type_width$}  {:>12}  {}\n",
            summary.id, summary.scenario_type, summary.interaction_count, summary.name
        ));
    }
    out
}
