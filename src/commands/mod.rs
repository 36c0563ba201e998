//! Command dispatch and handlers.

pub mod archive;
pub mod delete;
pub mod list;
pub mod regress;
pub mod show;
pub mod status;

use crate::cli::{Cli, Command, StorageArgs};
use crate::config::HarnessConfig;
use crate::context::HarnessContext;
use crate::session::Harness;

/// Dispatch a parsed command line to its handler.
///
/// Configuration comes from the environment, with the CLI's storage flags
/// taking precedence.
///
/// # Errors
///
/// Returns an error string if configuration is invalid, the store cannot be
/// opened, or the selected command fails.
pub fn dispatch(cli: &Cli) -> Result<(), String> {
    let config = resolve_config(&cli.storage)?;
    let harness = Harness::new(HarnessContext::live(), config).map_err(|e| e.to_string())?;
    dispatch_with_harness(&cli.command, &harness)
}

fn resolve_config(storage: &StorageArgs) -> Result<HarnessConfig, String> {
    let mut config = HarnessConfig::from_env().map_err(|e| e.to_string())?;
    if let Some(dir) = &storage.scenarios_dir {
        config.scenarios_root.clone_from(dir);
    }
    if let Some(dir) = &storage.recordings_dir {
        config.recordings_root.clone_from(dir);
    }
    Ok(config)
}

/// Dispatch a command against an existing harness.
///
/// # Errors
///
/// Returns an error string if the command fails.
pub fn dispatch_with_harness(command: &Command, harness: &Harness) -> Result<(), String> {
    match command {
        Command::List { scenario_type } => list::run(harness, *scenario_type),
        Command::Show { id, format } => show::run(harness, id, *format),
        Command::Delete { id } => delete::run(harness, id),
        Command::ExportHar { id } => archive::export(harness, id),
        Command::ImportHar { file, name, scenario_type } => {
            archive::import(harness, file, name, *scenario_type)
        }
        Command::Regress { ids, target_url, save_report } => {
            regress::run(harness, ids, target_url.as_deref(), *save_report)
        }
        Command::Status => status::run(harness),
    }
}
