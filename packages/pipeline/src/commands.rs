//! Step entry points wired to the real services and terminal progress
//! bars. Shared by the `agrisynth` subcommands and the interactive menu.

use std::path::Path;

use agrisynth_cli_utils::{IndicatifProgress, MultiProgress};
use agrisynth_location::keys;
use agrisynth_location::registry::LocationRegistry;
use agrisynth_source::covariates::HttpCovariateSampler;
use agrisynth_source::quickstats::QuickStatsClient;

use crate::conditions::MonthOutcome;
use crate::crops::CropsOutcome;
use crate::{PipelineError, RunConfig, conditions, crops};

/// Environment variable holding the covariate service base URL.
pub const COVARIATE_SERVICE_URL_ENV: &str = "COVARIATE_SERVICE_URL";

/// Picks the covariate service URL from the flag or the environment.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if neither is set.
pub fn resolve_service_url(flag: Option<String>) -> Result<String, PipelineError> {
    pick_service_url(flag, std::env::var(COVARIATE_SERVICE_URL_ENV).ok())
}

fn pick_service_url(
    flag: Option<String>,
    from_env: Option<String>,
) -> Result<String, PipelineError> {
    let non_blank = |url: &String| !url.trim().is_empty();
    flag.filter(non_blank)
        .or_else(|| from_env.filter(non_blank))
        .map(|url| url.trim().to_string())
        .ok_or_else(|| PipelineError::InvalidConfig {
            message: format!(
                "no covariate service URL: pass --service-url or set {COVARIATE_SERVICE_URL_ENV}"
            ),
        })
}

/// Runs the crops step against the `QuickStats` API.
///
/// # Errors
///
/// Returns [`PipelineError`] if the location or API key cannot be resolved
/// or the step fails.
pub async fn crops(
    config: &RunConfig,
    registry: &LocationRegistry,
    keys_file: Option<&Path>,
    multi: &MultiProgress,
) -> Result<CropsOutcome, PipelineError> {
    let location = registry.get(&config.location)?;
    let api_key = keys::quickstats_api_key(keys_file)?;
    let client = QuickStatsClient::new(config.retry);
    let progress = IndicatifProgress::steps_bar(multi, "Crops", 0);

    let outcome = crops::run(config, location, &client, &api_key, &progress).await?;
    log::info!(
        "{}: {} grid points, {} labels, wrote {} and {}",
        location.name,
        outcome.grid_points,
        outcome.labels,
        outcome.labels_csv.display(),
        outcome.coordinates_json.display()
    );
    Ok(outcome)
}

/// Runs the conditions step against the covariate service at
/// `service_url`.
///
/// # Errors
///
/// Returns [`PipelineError`] if the location cannot be resolved or any
/// month fails.
pub async fn conditions(
    config: &RunConfig,
    registry: &LocationRegistry,
    service_url: &str,
    multi: &MultiProgress,
) -> Result<Vec<MonthOutcome>, PipelineError> {
    let location = registry.get(&config.location)?;
    let sampler = HttpCovariateSampler::new(service_url, config.retry);
    let progress = IndicatifProgress::records_bar(multi, "Sampling covariates");

    let outcomes = conditions::run(config, location, &sampler, &progress).await?;
    for outcome in &outcomes {
        log::info!(
            "Month {}: {} rows ({} without sample, {} repaired) -> {}",
            outcome.month,
            outcome.rows,
            outcome.absent,
            outcome.repair.filled,
            outcome.repaired_csv.display()
        );
    }
    Ok(outcomes)
}
