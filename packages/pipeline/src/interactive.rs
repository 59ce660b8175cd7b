#![allow(clippy::module_name_repetitions)]

//! Interactive menu for the dataset generator.
//!
//! Provides a menu-driven interface using `dialoguer` for running the
//! pipeline steps without memorizing CLI flags.

use std::path::{Path, PathBuf};

use agrisynth_cli_utils::MultiProgress;
use agrisynth_location::registry::LocationRegistry;
use dialoguer::{Input, Select};

use crate::{RunConfig, commands, location_table};

/// Top-level actions available in the interactive menu.
enum Action {
    ListLocations,
    Crops,
    Conditions,
    Run,
}

impl Action {
    const ALL: &[Self] = &[Self::ListLocations, Self::Crops, Self::Conditions, Self::Run];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::ListLocations => "List locations",
            Self::Crops => "Simulate annual crops",
            Self::Conditions => "Sample monthly conditions",
            Self::Run => "Run both steps",
        }
    }

    const fn needs_crops(&self) -> bool {
        matches!(self, Self::Crops | Self::Run)
    }

    const fn needs_conditions(&self) -> bool {
        matches!(self, Self::Conditions | Self::Run)
    }
}

/// Runs the interactive menu, prompting the user to select and configure
/// a pipeline step.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected step fails.
pub async fn run(
    multi: &MultiProgress,
    registry: &LocationRegistry,
    keys_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;
    let action = &Action::ALL[idx];

    if matches!(action, Action::ListLocations) {
        print!("{}", location_table(registry));
        return Ok(());
    }

    let config = prompt_config(registry, action)?;

    // Resolve the service URL before spending time on the crops step.
    let service_url = if action.needs_conditions() {
        Some(prompt_service_url()?)
    } else {
        None
    };

    if action.needs_crops() {
        commands::crops(&config, registry, keys_file, multi).await?;
    }
    if let Some(url) = service_url {
        commands::conditions(&config, registry, &url, multi).await?;
    }

    Ok(())
}

fn prompt_config(
    registry: &LocationRegistry,
    action: &Action,
) -> Result<RunConfig, Box<dyn std::error::Error>> {
    let ids: Vec<&str> = registry.ids().collect();
    let labels: Vec<String> = registry
        .iter()
        .map(|l| format!("{} ({})", l.id, l.name))
        .collect();
    let idx = Select::new()
        .with_prompt("Location")
        .items(&labels)
        .default(0)
        .interact()?;

    let mut config = RunConfig::new(ids[idx]);

    config.year = Input::new()
        .with_prompt("Year")
        .default(config.year)
        .interact_text()?;

    let output_dir: String = Input::new()
        .with_prompt("Output directory")
        .default(config.output_dir.display().to_string())
        .interact_text()?;
    config.output_dir = PathBuf::from(output_dir);

    config.sample_size = prompt_optional_usize("Sample size cap (empty for all points)")?;

    if action.needs_crops() {
        config.block_side_m = Input::new()
            .with_prompt("Block side (meters)")
            .default(config.block_side_m)
            .interact_text()?;
    }

    if action.needs_conditions() {
        config.starting_month = Input::new()
            .with_prompt("Starting month (1-12)")
            .default(config.starting_month)
            .interact_text()?;
        config.number_of_months = Input::new()
            .with_prompt("Number of months")
            .default(config.number_of_months)
            .interact_text()?;
        config.months()?;
    }

    Ok(config)
}

fn prompt_service_url() -> Result<String, Box<dyn std::error::Error>> {
    if let Ok(url) = commands::resolve_service_url(None) {
        return Ok(url);
    }
    let url: String = Input::new()
        .with_prompt("Covariate service URL")
        .interact_text()?;
    Ok(commands::resolve_service_url(Some(url))?)
}

fn prompt_optional_usize(prompt: &str) -> Result<Option<usize>, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    if input.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(input.trim().parse()?))
    }
}
