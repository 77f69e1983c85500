//! plate-ingest: consolidate per-directory microscopy CSV exports.
//!
//! # Usage
//!
//! ```bash
//! # Parquet, one file per table kind under out/
//! plate-ingest ingest plates/P001 out/ --report out/report.json
//!
//! # DuckDB database
//! plate-ingest ingest plates/P001 P001.duckdb --engine duckdb
//!
//! # Show the decoded configuration
//! plate-ingest check-config --config ingest.toml
//! ```

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::error;

use pi_config::{Backend, IngestConfig};
use pi_core::exit_codes::ExitCode;
use pi_core::logging::{init_logging, LogFormat};
use pi_core::{IngestReport, Orchestrator};

#[derive(Parser, Debug)]
#[command(
    name = "plate-ingest",
    version,
    about = "Ingest per-directory CSV exports into Parquet or DuckDB"
)]
struct Cli {
    /// Log line format on stderr
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest every directory under SOURCE into OUTPUT
    Ingest(IngestArgs),
    /// Print the decoded configuration as JSON
    CheckConfig(CheckConfigArgs),
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Plate directory holding one subdirectory per well or field
    source: PathBuf,

    /// Output directory (parquet) or database file (duckdb)
    output: PathBuf,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE", env = "PLATE_INGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Output backend, overriding the configuration
    #[arg(long, value_enum)]
    engine: Option<EngineArg>,

    /// Seed for reference sampling, overriding the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Write the run report as JSON to this path
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CheckConfigArgs {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE", env = "PLATE_INGEST_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EngineArg {
    Parquet,
    Duckdb,
}

impl From<EngineArg> for Backend {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Parquet => Backend::Parquet,
            EngineArg::Duckdb => Backend::Duckdb,
        }
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format, "info");

    let code = match cli.command {
        Command::Ingest(args) => run_ingest(args),
        Command::CheckConfig(args) => run_check_config(args),
    };
    code.into()
}

fn load_config(path: Option<&Path>) -> Result<IngestConfig, ExitCode> {
    IngestConfig::load(path).map_err(|e| {
        error!(error = %e, "invalid configuration");
        eprintln!("plate-ingest: {e}");
        ExitCode::ConfigError
    })
}

fn run_ingest(args: IngestArgs) -> ExitCode {
    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(code) => return code,
    };
    if let Some(engine) = args.engine {
        config.backend = engine.into();
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    let orchestrator = Orchestrator::new(config, &args.output);
    match orchestrator.run(&args.source) {
        Ok(report) => {
            println!("{}", report.summary_line());
            match write_report(&report, args.report.as_deref()) {
                Ok(()) => report.exit_code(),
                Err(code) => code,
            }
        }
        Err(failure) => {
            error!(error = %failure.error, code = failure.error.code(), "ingest failed");
            eprintln!("plate-ingest: {}", failure.error);
            // The failure's own exit code wins over a report write error.
            let _ = write_report(&failure.report, args.report.as_deref());
            failure.exit_code()
        }
    }
}

fn write_report(report: &IngestReport, path: Option<&Path>) -> Result<(), ExitCode> {
    let Some(path) = path else {
        return Ok(());
    };
    report.write_json(path).map_err(|e| {
        error!(path = %path.display(), error = %e, "cannot write report");
        eprintln!("plate-ingest: {e}");
        ExitCode::IoError
    })
}

fn run_check_config(args: CheckConfigArgs) -> ExitCode {
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(code) => return code,
    };
    match serde_json::to_string_pretty(&config) {
        Ok(json) => {
            println!("{json}");
            ExitCode::Clean
        }
        Err(e) => {
            eprintln!("plate-ingest: {e}");
            ExitCode::InternalError
        }
    }
}
