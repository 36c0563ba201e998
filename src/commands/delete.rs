//! `scenario-harness delete` command.

use crate::session::Harness;

/// Execute the `delete` command.
///
/// # Errors
///
/// Returns an error string if the scenario is unknown or cannot be removed.
pub fn run(harness: &Harness, id: &str) -> Result<(), String> {
    harness.delete_scenario(id).map_err(|e| e.to_string())?;
    println!("Deleted scenario {id}");
    Ok(())
}
