//! USDA NASS `QuickStats` crop statistics retriever.
//!
//! Queries county-level Census of Agriculture records one commodity group
//! at a time and sums every returned record (all years at or after the
//! lower bound) into a [`CropProductionTable`].
//!
//! See <https://quickstats.nass.usda.gov/api>

use agrisynth_dataset_models::CropProductionTable;
use async_trait::async_trait;
use serde::Deserialize;

use crate::SourceError;
use crate::parsing::parse_production_value;
use crate::retry::{self, RetryPolicy};

/// `QuickStats` GET endpoint.
pub const QUICKSTATS_API_URL: &str = "http://quickstats.nass.usda.gov/api/api_GET/";

/// Commodity groups queried by default.
pub const DEFAULT_CATEGORIES: &[&str] = &["VEGETABLES", "FRUIT & TREE NUTS"];

/// The county and time range to query.
#[derive(Debug, Clone)]
pub struct CropQuery<'a> {
    /// `QuickStats` API key.
    pub api_key: &'a str,
    /// Two-digit state FIPS code.
    pub state_fips: &'a str,
    /// Three-digit county code.
    pub county_fips: &'a str,
    /// Earliest year to include (`year__GE`).
    pub year_lower_bound: i32,
}

/// One record as returned by the API. Only the fields we use are kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CropRecord {
    /// Commodity name (e.g. `"ONIONS"`, `"VEGETABLE TOTALS"`).
    pub commodity_desc: String,
    /// Raw value string (e.g. `"1,234"` or `"(D)"`).
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct QuickStatsResponse {
    #[serde(default)]
    data: Vec<CropRecord>,
}

/// A source of per-category crop records.
#[async_trait]
pub trait CropStatistics: Send + Sync {
    /// Fetches every record for one commodity group.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the records cannot be retrieved.
    async fn fetch_category(
        &self,
        query: &CropQuery<'_>,
        category: &str,
    ) -> Result<Vec<CropRecord>, SourceError>;
}

/// HTTP client for the `QuickStats` API.
#[derive(Debug, Clone)]
pub struct QuickStatsClient {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl QuickStatsClient {
    /// Creates a client for the public endpoint.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_base_url(QUICKSTATS_API_URL, policy)
    }

    /// Creates a client for a different endpoint (mirrors, tests).
    #[must_use]
    pub fn with_base_url(base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            policy,
        }
    }
}

#[async_trait]
impl CropStatistics for QuickStatsClient {
    async fn fetch_category(
        &self,
        query: &CropQuery<'_>,
        category: &str,
    ) -> Result<Vec<CropRecord>, SourceError> {
        let year = query.year_lower_bound.to_string();
        let params = [
            ("key", query.api_key),
            ("source_desc", "CENSUS"),
            ("sector_desc", "CROPS"),
            ("group_desc", category),
            ("agg_level_desc", "COUNTY"),
            ("state_fips_code", query.state_fips),
            ("county_code", query.county_fips),
            ("year__GE", year.as_str()),
            ("format", "json"),
        ];

        let label = format!("QuickStats {category}");
        log::info!("Making API request for {category}");
        let body = retry::send_json(&self.policy, &label, || {
            self.client.get(&self.base_url).query(&params)
        })
        .await?;
        log::info!("API request for {category} successful");

        parse_response(body)
    }
}

fn parse_response(body: serde_json::Value) -> Result<Vec<CropRecord>, SourceError> {
    let response: QuickStatsResponse = serde_json::from_value(body)?;
    Ok(response.data)
}

/// Fetches every category and sums production per crop.
///
/// Crops keep the order in which they are first seen (categories in the
/// given order, records in response order). Withheld values count as zero;
/// other unparseable values are logged and skipped.
///
/// # Errors
///
/// Returns [`SourceError`] if any category cannot be fetched. Partial
/// results are discarded.
pub async fn fetch_crop_productions(
    stats: &dyn CropStatistics,
    query: &CropQuery<'_>,
    categories: &[&str],
) -> Result<CropProductionTable, SourceError> {
    let mut table = CropProductionTable::new();

    for category in categories {
        let records = stats.fetch_category(query, category).await.map_err(|e| {
            log::error!("Failed to fetch data for category {category}: {e}");
            e
        })?;
        log::debug!("{category}: {} records", records.len());
        accumulate(&mut table, &records);
    }

    Ok(table)
}

fn accumulate(table: &mut CropProductionTable, records: &[CropRecord]) {
    for record in records {
        match parse_production_value(&record.value) {
            Ok(production) => table.add(&record.commodity_desc, production),
            Err(e) => log::error!("Skipping {} record: {e}", record.commodity_desc),
        }
    }
}
