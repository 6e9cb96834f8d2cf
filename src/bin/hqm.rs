//! hqm CLI - inspect the managed SDK contract and check bridge configuration
//!
//! Commands:
//! - contract: print every class, method and field the bridge resolves
//! - validate: check a `BridgeConfig` JSON file

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use hqm::config::{BridgeConfig, ContractEntry, MemberKind, SdkFlavor};
use hqm::{BridgeError, HQM_VERSION};

/// hqm - developer tooling for the HQM bridge
#[derive(Parser)]
#[command(name = "hqm")]
#[command(version = HQM_VERSION)]
#[command(about = "Inspect the HQ SDK contract used by the HQM bridge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the managed members the bridge resolves at attach time
    Contract {
        /// SDK flavor preset
        #[arg(long, value_enum, default_value = "core", conflicts_with = "config")]
        flavor: Flavor,

        /// Use the contract from a configuration file instead of a preset
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a bridge configuration file
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output the effective configuration as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Flavor {
    Core,
    Legacy,
}

impl From<Flavor> for SdkFlavor {
    fn from(flavor: Flavor) -> Self {
        match flavor {
            Flavor::Core => SdkFlavor::Core,
            Flavor::Legacy => SdkFlavor::Legacy,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error = serde_json::to_string(&CliError::from(e))
                .unwrap_or_else(|_| "Unknown error".to_string());
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), HqmCliError> {
    match cli.command {
        Commands::Contract {
            flavor,
            config,
            json,
        } => cmd_contract(flavor.into(), config.as_deref(), json),

        Commands::Validate { input, json } => cmd_validate(&input, json),
    }
}

fn read_input(input: &Path) -> Result<String, HqmCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

/// Pretty JSON on a terminal, compact JSON when piped
fn to_json<T: serde::Serialize>(value: &T) -> Result<String, HqmCliError> {
    let json = if atty::is(atty::Stream::Stdout) {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn cmd_contract(flavor: SdkFlavor, config: Option<&Path>, json: bool) -> Result<(), HqmCliError> {
    let contract = match config {
        Some(path) => BridgeConfig::from_json(&read_input(path)?)?.contract(),
        None => flavor.contract(),
    };
    let entries = contract.entries();

    if json {
        println!(
            "{}",
            to_json(&ContractReport {
                init_layout: format!("{:?}", contract.init_layout),
                entries,
            })?
        );
        return Ok(());
    }

    println!("HQM Contract");
    println!("============");
    println!("SDK class:   {}", contract.sdk_class);
    println!("List class:  {}", contract.list_class);
    println!("Group class: {}", contract.group_class);
    println!("\nMembers:");
    for entry in &entries {
        println!("  {}", describe(entry));
    }

    let missing: Vec<&str> = [
        ("request_user_data", &contract.methods.request_user_data),
        ("delete_user_data", &contract.methods.delete_user_data),
        ("uuid", &contract.methods.uuid),
    ]
    .into_iter()
    .filter(|(_, name)| name.is_none())
    .map(|(role, _)| role)
    .collect();
    if !missing.is_empty() {
        println!("\nNot provided: {}", missing.join(", "));
    }

    Ok(())
}

fn describe(entry: &ContractEntry) -> String {
    let kind = match entry.kind {
        MemberKind::StaticMethod => "static",
        MemberKind::Method => "method",
        MemberKind::Field => "field ",
    };
    format!(
        "[{}] {:<18} {}.{} {}",
        kind, entry.role, entry.class, entry.name, entry.signature
    )
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), HqmCliError> {
    let config = BridgeConfig::from_json(&read_input(input)?)?;

    if json {
        let effective = BridgeConfig {
            contract: Some(config.contract()),
            ..config
        };
        println!("{}", to_json(&effective)?);
    } else {
        let contract = config.contract();
        println!("Configuration OK");
        println!("  flavor:           {}", config.flavor.as_str());
        println!("  sdk class:        {}", contract.sdk_class);
        println!("  background tasks: {}", config.background_tasks);
        println!(
            "  log level:        {}",
            config.log_level.as_deref().unwrap_or("(caller provided)")
        );
        println!("  members:          {}", contract.entries().len());
    }

    Ok(())
}

// Error types

#[derive(Debug)]
enum HqmCliError {
    Io(io::Error),
    Bridge(BridgeError),
    Json(serde_json::Error),
}

impl From<io::Error> for HqmCliError {
    fn from(e: io::Error) -> Self {
        HqmCliError::Io(e)
    }
}

impl From<BridgeError> for HqmCliError {
    fn from(e: BridgeError) -> Self {
        HqmCliError::Bridge(e)
    }
}

impl From<serde_json::Error> for HqmCliError {
    fn from(e: serde_json::Error) -> Self {
        HqmCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<HqmCliError> for CliError {
    fn from(e: HqmCliError) -> Self {
        match e {
            HqmCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            HqmCliError::Bridge(e) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'hqm contract' to see the expected members".to_string()),
            },
            HqmCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ContractReport {
    init_layout: String,
    entries: Vec<ContractEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flavor_conflicts_with_config() {
        let parsed = Cli::try_parse_from([
            "hqm", "contract", "--flavor", "legacy", "--config", "hqm.json",
        ]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from(["hqm", "contract", "--config", "hqm.json"]);
        assert!(parsed.is_ok());
    }
}
