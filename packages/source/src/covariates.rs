//! Client for the covariate sampling service.
//!
//! The service reduces Earth-observation imagery over a time window and
//! samples one pixel at a coordinate. The client tells it which bands to
//! reduce (see [`COVARIATE_BANDS`]) and converts the raw values it gets
//! back into [`Covariates`].

use agrisynth_dataset_models::{BlockCoordinate, Covariate, Covariates};
use async_trait::async_trait;
use chrono::{Datelike as _, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::SourceError;
use crate::retry::{self, RetryPolicy};

/// Offset between Kelvin and degrees Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

/// GLDAS Noah land surface model, 3-hourly, 0.25°.
pub const GLDAS_DATASET: &str = "NASA/GLDAS/V021/NOAH/G025/T3H";

/// SRTM 1 arc-second digital elevation model.
pub const SRTM_DATASET: &str = "USGS/SRTMGL1_003";

/// A half-open date range `[start, end)` covering one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleWindow {
    /// First day of the month.
    pub start: NaiveDate,
    /// First day of the following month.
    pub end: NaiveDate,
}

impl SampleWindow {
    /// Returns the window for `month` (1-12) of `year`, or `None` if the
    /// month is out of range.
    #[must_use]
    pub fn for_month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self { start, end })
    }

    /// Month number (1-12) of the window start.
    #[must_use]
    pub fn month(&self) -> u32 {
        self.start.month()
    }
}

/// How a band is reduced over the time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    /// Mean of all images in the window.
    Mean,
    /// Per-pixel maximum.
    Max,
    /// Per-pixel minimum.
    Min,
    /// Static image, no temporal reduction.
    Static,
}

/// One band requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandSpec {
    /// Output column the value feeds.
    pub covariate: Covariate,
    /// Image collection or image id.
    pub dataset: &'static str,
    /// Band name within the dataset. `slope` is derived from SRTM elevation
    /// by the service.
    pub band: &'static str,
    /// Temporal reduction.
    pub reducer: Reducer,
    /// Whether the raw value is in Kelvin and must be converted to °C.
    pub kelvin: bool,
}

/// Every covariate the dataset carries, in output column order.
pub const COVARIATE_BANDS: &[BandSpec] = &[
    BandSpec {
        covariate: Covariate::Temperature,
        dataset: GLDAS_DATASET,
        band: "Tair_f_inst",
        reducer: Reducer::Mean,
        kelvin: true,
    },
    BandSpec {
        covariate: Covariate::MaxTemperature,
        dataset: GLDAS_DATASET,
        band: "Tair_f_inst",
        reducer: Reducer::Max,
        kelvin: true,
    },
    BandSpec {
        covariate: Covariate::MinTemperature,
        dataset: GLDAS_DATASET,
        band: "Tair_f_inst",
        reducer: Reducer::Min,
        kelvin: true,
    },
    BandSpec {
        covariate: Covariate::Transpiration,
        dataset: GLDAS_DATASET,
        band: "Evap_tavg",
        reducer: Reducer::Mean,
        kelvin: false,
    },
    BandSpec {
        covariate: Covariate::WindSpeed,
        dataset: GLDAS_DATASET,
        band: "Wind_f_inst",
        reducer: Reducer::Mean,
        kelvin: false,
    },
    BandSpec {
        covariate: Covariate::Humidity,
        dataset: GLDAS_DATASET,
        band: "Qair_f_inst",
        reducer: Reducer::Mean,
        kelvin: false,
    },
    BandSpec {
        covariate: Covariate::Elevation,
        dataset: SRTM_DATASET,
        band: "elevation",
        reducer: Reducer::Static,
        kelvin: false,
    },
    BandSpec {
        covariate: Covariate::Slope,
        dataset: SRTM_DATASET,
        band: "slope",
        reducer: Reducer::Static,
        kelvin: false,
    },
];

/// Samples covariates at a single coordinate.
#[async_trait]
pub trait CovariateSampler: Send + Sync {
    /// Samples every covariate at `coordinate` over `window`.
    ///
    /// Returns `Ok(None)` when the service has no pixel there.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the service cannot be reached or keeps
    /// failing.
    async fn sample(
        &self,
        coordinate: BlockCoordinate,
        window: &SampleWindow,
        scale_m: f64,
    ) -> Result<Option<Covariates>, SourceError>;
}

#[derive(Debug, Serialize)]
struct BandRequest<'a> {
    name: &'a str,
    dataset: &'a str,
    band: &'a str,
    reducer: Reducer,
}

#[derive(Debug, Serialize)]
struct SampleRequest<'a> {
    longitude: f64,
    latitude: f64,
    start_date: String,
    end_date: String,
    scale: f64,
    bands: Vec<BandRequest<'a>>,
}

impl SampleRequest<'_> {
    fn new(coordinate: BlockCoordinate, window: &SampleWindow, scale: f64) -> Self {
        Self {
            longitude: coordinate.longitude,
            latitude: coordinate.latitude,
            start_date: window.start.format("%Y-%m-%d").to_string(),
            end_date: window.end.format("%Y-%m-%d").to_string(),
            scale,
            bands: COVARIATE_BANDS
                .iter()
                .map(|spec| BandRequest {
                    name: spec.covariate.as_ref(),
                    dataset: spec.dataset,
                    band: spec.band,
                    reducer: spec.reducer,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SampleResponse {
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
}

/// HTTP implementation of [`CovariateSampler`].
#[derive(Debug, Clone)]
pub struct HttpCovariateSampler {
    client: reqwest::Client,
    sample_url: String,
    policy: RetryPolicy,
}

impl HttpCovariateSampler {
    /// Creates a sampler talking to the service rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            sample_url: format!("{}/sample", base_url.trim_end_matches('/')),
            policy,
        }
    }
}

#[async_trait]
impl CovariateSampler for HttpCovariateSampler {
    async fn sample(
        &self,
        coordinate: BlockCoordinate,
        window: &SampleWindow,
        scale_m: f64,
    ) -> Result<Option<Covariates>, SourceError> {
        let request = SampleRequest::new(coordinate, window, scale_m);
        let label = format!("sample {}", coordinate.key());

        let body = retry::send_json_optional(&self.policy, &label, || {
            self.client.post(&self.sample_url).json(&request)
        })
        .await?;

        match body {
            Some(body) => parse_sample_response(body),
            None => Ok(None),
        }
    }
}

/// Converts a service response into covariates.
///
/// Missing or non-numeric properties become `None`. Temperatures are
/// converted from Kelvin to °C.
///
/// # Errors
///
/// Returns [`SourceError::Json`] if the body is not a sample response.
pub fn parse_sample_response(body: serde_json::Value) -> Result<Option<Covariates>, SourceError> {
    let response: SampleResponse = serde_json::from_value(body)?;
    let Some(properties) = response.properties else {
        return Ok(None);
    };

    let mut covariates = Covariates::default();
    for spec in COVARIATE_BANDS {
        let value = properties
            .get(spec.covariate.as_ref())
            .and_then(serde_json::Value::as_f64)
            .map(|v| if spec.kelvin { v - KELVIN_OFFSET } else { v });
        covariates.set(spec.covariate, value);
    }

    Ok(Some(covariates))
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator as _;

    use super::*;

    #[test]
    fn december_window_rolls_into_next_year() {
        let window = SampleWindow::for_month(2020, 12).unwrap();
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2020, 12, 1).unwrap());
        assert_eq!(window.end, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(window.month(), 12);
    }

    #[test]
    fn mid_year_window_ends_on_next_month() {
        let window = SampleWindow::for_month(2020, 2).unwrap();
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2020, 2, 1).unwrap());
        assert_eq!(window.end, NaiveDate::from_ymd_opt(2020, 3, 1).unwrap());
    }

    #[test]
    fn invalid_months_have_no_window() {
        assert!(SampleWindow::for_month(2020, 0).is_none());
        assert!(SampleWindow::for_month(2020, 13).is_none());
    }

    #[test]
    fn band_table_covers_every_covariate_in_order() {
        let from_table: Vec<Covariate> = COVARIATE_BANDS.iter().map(|s| s.covariate).collect();
        let all: Vec<Covariate> = Covariate::iter().collect();
        assert_eq!(from_table, all);
    }

    #[test]
    fn request_serializes_band_names() {
        let coordinate = BlockCoordinate {
            longitude: -97.9,
            latitude: 26.5,
        };
        let window = SampleWindow::for_month(2020, 3).unwrap();
        let json = serde_json::to_value(SampleRequest::new(coordinate, &window, 1000.0)).unwrap();

        assert_eq!(json["start_date"], "2020-03-01");
        assert_eq!(json["end_date"], "2020-04-01");
        assert_eq!(json["bands"][1]["name"], "Max_Temperature");
        assert_eq!(json["bands"][1]["band"], "Tair_f_inst");
        assert_eq!(json["bands"][1]["reducer"], "max");
        assert_eq!(json["bands"][7]["reducer"], "static");
    }

    #[test]
    fn converts_kelvin_and_keeps_missing_as_none() {
        let body = serde_json::json!({
            "properties": {
                "Temperature": 298.15,
                "Max_Temperature": 305.15,
                "Min_Temperature": 288.15,
                "Transpiration": 0.00002,
                "Wind_Speed": 4.5,
                "Humidity": null,
                "Elevation": 12.0
            }
        });
        let covariates = parse_sample_response(body).unwrap().unwrap();

        assert!((covariates.temperature.unwrap() - 25.0).abs() < 1e-9);
        assert!((covariates.max_temperature.unwrap() - 32.0).abs() < 1e-9);
        assert!((covariates.min_temperature.unwrap() - 15.0).abs() < 1e-9);
        assert_eq!(covariates.wind_speed, Some(4.5));
        assert_eq!(covariates.humidity, None);
        assert_eq!(covariates.elevation, Some(12.0));
        assert_eq!(covariates.slope, None);
    }

    #[test]
    fn null_properties_is_absent() {
        let body = serde_json::json!({ "properties": null });
        assert!(parse_sample_response(body).unwrap().is_none());
        assert!(parse_sample_response(serde_json::json!({})).unwrap().is_none());
    }
}
