use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Once;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use claimguard_pipeline::{CliOverrides, ModelKind, Pipeline, PipelineConfig};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Reads `CLAIMGUARD_LOG` (e.g. `CLAIMGUARD_LOG=claimguard_selection=debug`),
/// falling back to `claimguard=info`, or debug with `-v`.
fn init_tracing(verbose: bool) {
    INIT.call_once(|| {
        let fallback = if verbose { "claimguard=debug" } else { "claimguard=info" };
        let filter = EnvFilter::try_from_env("CLAIMGUARD_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}

#[derive(Parser)]
#[command(name = "claimguard", version, about = "Fraud detection on auto-insurance claims")]
struct Cli {
    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Args)]
struct Source {
    /// Claims CSV file.
    #[arg(long, env = "CLAIMGUARD_DATA")]
    data: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit every enabled model and compare them.
    Run {
        #[command(flatten)]
        source: Source,

        /// Seed for the split and the stochastic models.
        #[arg(long)]
        seed: Option<u64>,

        /// Fraction of rows held out for testing.
        #[arg(long)]
        test_size: Option<f64>,

        /// Write the run report as JSON.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Comma-separated models to run (e.g. `svc,knn,decision_tree`).
        #[arg(long, value_delimiter = ',')]
        models: Option<Vec<ModelKind>>,
    },
    /// Print an exploratory summary of the raw claims table.
    Inspect {
        #[command(flatten)]
        source: Source,
    },
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.cmd {
        Commands::Run {
            source,
            seed,
            test_size,
            report,
            models,
        } => {
            let overrides = CliOverrides {
                data: source.data,
                seed,
                test_size,
                models,
            };
            let config = PipelineConfig::load(source.config.as_deref(), &overrides)
                .context("failed to load configuration")?;
            let run = Pipeline::new(config).run().context("pipeline run failed")?;

            for evaluation in &run.models {
                println!("{}", "=".repeat(60));
                println!("{}", evaluation);
            }
            println!("{}", "=".repeat(60));
            println!("Model comparison (test accuracy)\n");
            print!("{}", run.leaderboard);

            if let Some(path) = report {
                run.write_json(&path)
                    .with_context(|| format!("failed to write report to {}", path.display()))?;
                info!(path = %path.display(), "report written");
            }
        }
        Commands::Inspect { source } => {
            let overrides = CliOverrides {
                data: source.data,
                ..CliOverrides::default()
            };
            let config = PipelineConfig::load(source.config.as_deref(), &overrides)
                .context("failed to load configuration")?;
            let inspection = Pipeline::new(config).inspect().context("inspection failed")?;
            print!("{}", inspection);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
