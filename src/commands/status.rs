//! `scenario-harness status` command.

use std::collections::BTreeMap;

use crate::scenario::format::ScenarioType;
use crate::session::Harness;

/// Execute the `status` command.
///
/// Shows the storage roots, the session state, and how many scenarios of
/// each type are stored.
///
/// # Errors
///
/// Returns an error string if the catalog cannot be read.
pub fn run(harness: &Harness) -> Result<(), String> {
    let summaries = harness.list_scenarios(None).map_err(|e| e.to_string())?;
    let mut counts: BTreeMap<ScenarioType, usize> = ScenarioType::ALL.iter().map(|ty| (*ty, 0)).collect();
    for summary in &summaries {
        *counts.entry(summary.scenario_type).or_default() += 1;
    }

    let config = harness.config();
    println!("Scenarios:  {}", config.scenarios_root.display());
    println!("Recordings: {}", config.recordings_root.display());
    println!("Session:    {}", harness.status().state);
    println!();
    for (scenario_type, count) in &counts {
        println!("  {scenario_type:<12} {count}");
    }
    println!("\n{} scenario(s) total.", summaries.len());
    Ok(())
}
