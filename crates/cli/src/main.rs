// aquiscope CLI - headless groundwater trend and extraction analysis

mod exit_codes;
mod logging;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use aquiscope_analysis::filter::WellFilter;
use aquiscope_analysis::model::ConsensusTrend;
use clap::{Parser, Subcommand, ValueEnum};

use exit_codes::{EXIT_ERROR, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "aquiscope")]
#[command(about = "Groundwater level trends, spatial aggregates and registry/census reconciliation")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Debug-level log output on stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis from a TOML config file
    #[command(after_help = "\
Examples:
  aquiscope run chile.toml
  aquiscope run chile.toml --json
  aquiscope run chile.toml --output report.json
  aquiscope run chile.toml --strict
  aquiscope run chile.toml --json --region Metropolitana --shac Lampa
  aquiscope run chile.toml --json --consensus decreasing,stable")]
    Run {
        /// Path to the analysis config
        config: PathBuf,

        /// Output JSON to stdout instead of the human summary only
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Fail when unit keys are excluded from a reconciliation
        #[arg(long)]
        strict: bool,

        /// Only report wells in this region
        #[arg(long)]
        region: Option<String>,

        /// Only report wells in this SHAC
        #[arg(long)]
        shac: Option<String>,

        /// Only report wells with these consensus trends (comma-separated)
        #[arg(long, value_enum, value_delimiter = ',')]
        consensus: Vec<ConsensusArg>,

        /// Only report wells whose id or name contains this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Validate an analysis config without running
    #[command(after_help = "\
Examples:
  aquiscope validate chile.toml")]
    Validate {
        /// Path to the analysis config
        config: PathBuf,
    },

    /// Fit the depth trend of a single well from a measurement CSV
    #[command(after_help = "\
Examples:
  aquiscope trend history.csv --station 05410001-6
  aquiscope trend history.csv --station W1 --date-format %d/%m/%Y --json")]
    Trend {
        /// Long-format measurement table
        history: PathBuf,

        /// Station id to fit
        #[arg(long)]
        station: String,

        /// Column holding the station id
        #[arg(long, default_value = "station_id")]
        station_column: String,

        /// Column holding the measurement date
        #[arg(long, default_value = "date")]
        date_column: String,

        /// Column holding depth to water
        #[arg(long, default_value = "depth")]
        depth_column: String,

        /// chrono format of the date column
        #[arg(long, default_value = "%Y-%m-%d")]
        date_format: String,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ConsensusArg {
    Decreasing,
    Increasing,
    Stable,
}

impl From<ConsensusArg> for ConsensusTrend {
    fn from(arg: ConsensusArg) -> Self {
        match arg {
            ConsensusArg::Decreasing => ConsensusTrend::Decreasing,
            ConsensusArg::Increasing => ConsensusTrend::Increasing,
            ConsensusArg::Stable => ConsensusTrend::Stable,
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  aquiscope-analysis ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(logging::level_for(cli.verbose, cli.quiet));

    let result = match cli.command {
        Commands::Run {
            config,
            json,
            output,
            strict,
            region,
            shac,
            consensus,
            search,
        } => run::cmd_run(run::RunArgs {
            config,
            json,
            output,
            strict,
            filter: WellFilter {
                region,
                shac,
                consensus: consensus.into_iter().map(ConsensusTrend::from).collect(),
                search,
            },
        }),
        Commands::Validate { config } => run::cmd_validate(config),
        Commands::Trend {
            history,
            station,
            station_column,
            date_column,
            depth_column,
            date_format,
            json,
        } => run::cmd_trend(run::TrendArgs {
            history,
            station,
            station_column,
            date_column,
            depth_column,
            date_format,
            json,
        }),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(EXIT_INVALID_CONFIG, msg)
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::new(EXIT_RUNTIME, msg)
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<aquiscope_analysis::AnalysisError> for CliError {
    fn from(err: aquiscope_analysis::AnalysisError) -> Self {
        use aquiscope_analysis::AnalysisError as E;
        match err {
            E::ConfigParse(_) | E::ConfigValidation(_) => Self::config(err.to_string()),
            E::MissingColumn { .. } => {
                Self::runtime(err.to_string()).with_hint("check the column mapping in the config")
            }
            E::ValueParse { .. } | E::Csv { .. } | E::Io(_) => Self::runtime(err.to_string()),
        }
    }
}
