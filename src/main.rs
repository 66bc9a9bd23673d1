use clap::{Parser, Subcommand};
use ferret::cli::analyze::{handle_analyze_command, AnalyzeArgs};
use ferret::cli::detectors::handle_detectors_command;
use ferret::cli::init::handle_init_command;
use ferret::config::CliOverrides;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "ferret")]
#[command(about = "Pluggable static analysis for Solidity projects")]
#[command(version = ferret::core::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default ferret.toml
    Init {
        #[arg(short, long, value_name = "PATH_TO_CONFIG")]
        config: Option<PathBuf>,
    },
    Analyze {
        #[arg(short, long)]
        scope: Option<Vec<PathBuf>>,

        #[arg(short, long)]
        exclude: Option<Vec<PathBuf>>,

        #[arg(short, long)]
        format: Option<String>,

        #[arg(short, long, value_name = "REPORT_FILE_NAME")]
        output: Option<PathBuf>,

        #[arg(short, long, value_name = "PATH_TO_CONFIG")]
        config: Option<PathBuf>,

        #[arg(short, long, value_name = "BASELINE_FILE")]
        baseline: Option<PathBuf>,

        /// Rewrite the baseline from this run's findings
        #[arg(long)]
        write_baseline: bool,

        /// With --write-baseline, drop entries no longer reported
        #[arg(long)]
        remove_fixed: bool,

        #[arg(long, value_delimiter = ',')]
        disable: Option<Vec<String>>,

        #[arg(long, value_delimiter = ',')]
        enable: Option<Vec<String>>,

        /// Exit with status 2 when errors are reported
        #[arg(long)]
        exit_code: bool,
    },
    Detectors {
        #[arg(short, long)]
        severity: Option<String>,

        #[arg(short, long)]
        details: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FERRET_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { config } => handle_init_command(config.as_deref()),

        Commands::Analyze {
            scope,
            exclude,
            format,
            output,
            config,
            baseline,
            write_baseline,
            remove_fixed,
            disable,
            enable,
            exit_code,
        } => {
            let args = AnalyzeArgs {
                overrides: CliOverrides {
                    scope,
                    exclude,
                    format,
                    baseline,
                    write_baseline,
                    remove_fixed,
                    disable,
                    enable,
                },
                output,
                config_path: config,
            };
            handle_analyze_command(args).map(|errors| {
                if exit_code && errors > 0 {
                    std::process::exit(2);
                }
            })
        }

        Commands::Detectors { severity, details } => handle_detectors_command(severity, details),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
