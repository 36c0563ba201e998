//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::scenario::format::ScenarioType;

/// Top-level CLI parser for `scenario-harness`.
#[derive(Debug, Parser)]
#[command(name = "scenario-harness", version, about = "Browse, export, and replay recorded test scenarios")]
pub struct Cli {
    /// Storage locations; override the environment.
    #[command(flatten)]
    pub storage: StorageArgs,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Storage root overrides shared by every command.
#[derive(Debug, Default, Args)]
pub struct StorageArgs {
    /// Root directory of scenario documents.
    #[arg(long, global = true, value_name = "DIR")]
    pub scenarios_dir: Option<PathBuf>,

    /// Root directory of archive exports and reports.
    #[arg(long, global = true, value_name = "DIR")]
    pub recordings_dir: Option<PathBuf>,
}

/// Output format for `show`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List stored scenarios.
    List {
        /// Only list scenarios of this type.
        #[arg(long = "type", value_name = "TYPE", value_parser = parse_scenario_type)]
        scenario_type: Option<ScenarioType>,
    },
    /// Print a stored scenario.
    Show {
        /// Scenario identifier.
        id: String,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Delete a stored scenario and its archive export.
    Delete {
        /// Scenario identifier.
        id: String,
    },
    /// Write the HTTP-archive export of a stored scenario.
    ExportHar {
        /// Scenario identifier.
        id: String,
    },
    /// Store an HTTP-archive document as a new scenario.
    ImportHar {
        /// Archive file to read.
        file: PathBuf,
        /// Name of the new scenario.
        #[arg(long)]
        name: String,
        /// Type of the new scenario.
        #[arg(long = "type", value_name = "TYPE", value_parser = parse_scenario_type, default_value = "regression")]
        scenario_type: ScenarioType,
    },
    /// Replay stored scenarios against a running service.
    Regress {
        /// Scenarios to run; defaults to every regression scenario.
        ids: Vec<String>,
        /// Base URL of the service under test.
        #[arg(long, value_name = "URL")]
        target_url: Option<String>,
        /// Write the report under the recordings root.
        #[arg(long)]
        save_report: bool,
    },
    /// Show storage locations and catalog counts.
    Status,
}

fn parse_scenario_type(value: &str) -> Result<ScenarioType, String> {
    value.parse()
}
