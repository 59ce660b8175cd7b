#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the synthetic crop dataset generator.
//!
//! Without a subcommand, falls back to the interactive menu.
//!
//! Uses `indicatif-log-bridge` (via [`agrisynth_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

use std::path::PathBuf;

use agrisynth_location::registry::LocationRegistry;
use agrisynth_pipeline::config::{
    DEFAULT_BLOCK_SIDE_M, DEFAULT_OUTPUT_DIR, DEFAULT_SCALE_M, DEFAULT_YEAR,
};
use agrisynth_pipeline::{RunConfig, commands, location_table};
use agrisynth_source::retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agrisynth", about = "Synthetic crop and conditions dataset generator")]
struct Cli {
    /// Extra location registry TOML (tables keyed by location id)
    #[arg(long, global = true)]
    locations: Option<PathBuf>,
    /// TOML file with an `[api_keys]` table, used when `QUICKSTATS_API_KEY` is unset
    #[arg(long, global = true)]
    keys: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all registered locations
    Locations,
    /// Fetch crop statistics, partition the region and write crop labels
    Crops {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        crops: CropsArgs,
    },
    /// Sample monthly covariates for the labelled grid
    Conditions {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        conditions: ConditionsArgs,
    },
    /// Run the crops step, then the conditions step
    Run {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        crops: CropsArgs,
        #[command(flatten)]
        conditions: ConditionsArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Location id (see `agrisynth locations`)
    location: String,
    /// Census year
    #[arg(long, default_value_t = DEFAULT_YEAR)]
    year: i32,
    /// Directory artifacts are read from and written to
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
    /// Only keep the first N grid points
    #[arg(long)]
    sample_size: Option<usize>,
    /// Attempts per network call or file write before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,
}

#[derive(Args)]
struct CropsArgs {
    /// Grid block side in meters
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIDE_M)]
    block_side: f64,
    /// Minimum production share for a crop to be simulated
    #[arg(long)]
    min_ratio: Option<f64>,
    /// Statistics commodity groups to query (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,
}

#[derive(Args)]
struct ConditionsArgs {
    /// First month to sample (1-12)
    #[arg(long, default_value_t = 1)]
    starting_month: u32,
    /// Number of months to sample, stopping at December
    #[arg(long, default_value_t = 12)]
    months: u32,
    /// Sampling scale in meters
    #[arg(long, default_value_t = DEFAULT_SCALE_M)]
    scale: f64,
    /// Phenology JSON (default: `{output_dir}/{name}_crop_analysis.json`)
    #[arg(long)]
    phenology: Option<PathBuf>,
    /// Covariate service base URL (default: `COVARIATE_SERVICE_URL`)
    #[arg(long)]
    service_url: Option<String>,
}

impl CommonArgs {
    fn to_config(&self) -> RunConfig {
        let mut config = RunConfig::new(&self.location);
        config.year = self.year;
        config.output_dir.clone_from(&self.output_dir);
        config.sample_size = self.sample_size;
        config.retry = RetryPolicy {
            max_attempts: self.max_attempts,
            ..RetryPolicy::default()
        };
        config
    }
}

impl CropsArgs {
    fn apply(&self, config: &mut RunConfig) {
        config.block_side_m = self.block_side;
        if let Some(min_ratio) = self.min_ratio {
            config.min_ratio = min_ratio;
        }
        if !self.categories.is_empty() {
            config.categories.clone_from(&self.categories);
        }
    }
}

impl ConditionsArgs {
    fn apply(&self, config: &mut RunConfig) {
        config.starting_month = self.starting_month;
        config.number_of_months = self.months;
        config.scale_m = self.scale;
        config.phenology_file.clone_from(&self.phenology);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = agrisynth_cli_utils::init_logger();
    let cli = Cli::parse();

    let registry = LocationRegistry::load(cli.locations.as_deref())?;
    let keys = cli.keys.as_deref();

    let Some(command) = cli.command else {
        return agrisynth_pipeline::interactive::run(&multi, &registry, keys).await;
    };

    match command {
        Commands::Locations => print!("{}", location_table(&registry)),
        Commands::Crops { common, crops } => {
            let mut config = common.to_config();
            crops.apply(&mut config);
            commands::crops(&config, &registry, keys, &multi).await?;
        }
        Commands::Conditions { common, conditions } => {
            let mut config = common.to_config();
            conditions.apply(&mut config);
            config.months()?;
            let url = commands::resolve_service_url(conditions.service_url)?;
            commands::conditions(&config, &registry, &url, &multi).await?;
        }
        Commands::Run {
            common,
            crops,
            conditions,
        } => {
            let mut config = common.to_config();
            crops.apply(&mut config);
            conditions.apply(&mut config);
            config.months()?;
            let url = commands::resolve_service_url(conditions.service_url)?;

            commands::crops(&config, &registry, keys, &multi).await?;
            commands::conditions(&config, &registry, &url, &multi).await?;
        }
    }

    log::debug!("Done");
    Ok(())
}
