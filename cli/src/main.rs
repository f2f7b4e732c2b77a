//! CLI entry point for the holistic planner.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use holistic_planner_cli::config::Config;
use holistic_planner_cli::run::{self, PlanOptions};

#[derive(Parser)]
#[command(name = "holistic-planner")]
#[command(about = "Holistic portfolio planner: snapshot in, ordered trade plan out")]
#[command(version)]
struct Cli {
    /// Path to the CLI config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a plan for a portfolio snapshot
    Plan {
        /// Path to snapshot.json
        snapshot: PathBuf,

        /// Planner bucket (overrides the config)
        #[arg(long)]
        bucket: Option<String>,

        /// Evaluate sequences in batches through a sequence store
        #[arg(long)]
        incremental: bool,
    },

    /// Check the planner configuration
    Validate,

    /// Print the default planner configuration
    Defaults,

    /// List built-in modules and their default parameters
    Modules,
}

fn load_config(path: &Path) -> Config {
    // A missing config file means all defaults.
    if !path.exists() {
        return Config::default();
    }
    match Config::load(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Plan {
            snapshot,
            bucket,
            incremental,
        } => {
            let config = load_config(&cli.config);
            let opts = PlanOptions {
                bucket,
                incremental,
            };
            run::plan(&config, &snapshot, &opts).map(|_| ())
        }
        Command::Validate => {
            let config = load_config(&cli.config);
            match run::validate(&config) {
                Ok(report) if report.has_errors() => process::exit(2),
                other => other.map(|_| ()),
            }
        }
        Command::Defaults => run::defaults(),
        Command::Modules => run::modules(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(e.exit_code());
    }
}
