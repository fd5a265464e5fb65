mod commands;
mod helpers;

use clap::Parser;
use emcal_core::domain::CalibError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();
    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let calib_error = error.as_calib_error();
            eprintln!("{}", calib_error.diagnostic_line());
            calib_error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "emcal-calib",
    about = "EMCal test-beam calibration engine. Run ranges are half-open: [start, end)."
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Convert DAQ list-mode exports into per-run event files
    Ingest(commands::IngestArgs),
    /// Keep electron-dominated events inside the catalog selection window
    Select(commands::SelectArgs),
    /// Robust L1 regression toward the catalog's per-configuration goal
    Regress(commands::RegressArgs),
    /// Per-channel MIP gain equalization over muon runs
    MipCalib(commands::MipCalibArgs),
    /// Apply saved calibrations and write per-run energy histograms
    Apply(commands::ApplyArgs),
    /// Fit calibrated spectra and collect the resolution-vs-energy table
    Resolution(commands::ResolutionArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Ingest(args) => commands::run_ingest_command(args),
        CliCommand::Select(args) => commands::run_select_command(args),
        CliCommand::Regress(args) => commands::run_regress_command(args),
        CliCommand::MipCalib(args) => commands::run_mip_calib_command(args),
        CliCommand::Apply(args) => commands::run_apply_command(args),
        CliCommand::Resolution(args) => commands::run_resolution_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(CalibError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_calib_error(&self) -> CalibError {
        match self {
            Self::Usage(message) => CalibError::unknown_configuration("CLI.USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => CalibError::internal("CLI.INTERNAL", format!("{error:#}")),
        }
    }
}
