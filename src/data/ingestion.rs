use crate::data::Series;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Marker FRED uses for a date with no published value.
const MISSING_VALUE: &str = ".";

/// Number of most recent observations requested when looking up a latest value.
const LATEST_LOOKUP_LIMIT: u32 = 10;

/// Source of raw economic time series.
///
/// Implementations own transport, authentication and any retry behaviour;
/// callers treat both operations as opaque fetches.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Returns every published observation of `series_id` on or after `start`.
    async fn observations(&self, series_id: &str, start: NaiveDate) -> Result<Series>;

    /// Returns the most recent published value of `series_id`.
    async fn latest_value(&self, series_id: &str) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct FredResponse {
    #[serde(default)]
    observations: Vec<FredObservation>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: NaiveDate,
    value: String,
}

/// Fetches series observations from the FRED HTTP API.
///
/// # Key Features
/// * Fetches a window of observations starting at a given date
/// * Looks up the latest released value of a series
/// * Skips dates FRED reports as missing (`"."`)
/// * Surfaces FRED error messages as errors naming the series
pub struct FredClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl FredClient {
    /// Creates a new `FredClient`.
    ///
    /// # Arguments
    /// * `api_key`: FRED API key
    /// * `base_url`: API root, e.g. `https://api.stlouisfed.org`
    /// * `timeout`: Per-request timeout applied by the HTTP client
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build FRED HTTP client")?;

        Ok(Self {
            api_key,
            base_url,
            client,
        })
    }

    async fn fetch(&self, series_id: &str, params: &[(&str, String)]) -> Result<FredResponse> {
        let url = format!(
            "{}/fred/series/observations",
            self.base_url.trim_end_matches('/')
        );

        let mut query = vec![
            ("series_id", series_id.to_string()),
            ("api_key", self.api_key.clone()),
            ("file_type", "json".to_string()),
        ];
        query.extend(params.iter().map(|(k, v)| (*k, v.clone())));

        debug!(series_id, "requesting FRED observations");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("FRED request for {} failed", series_id))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read FRED response for {}", series_id))?;

        parse_response(series_id, status, &body)
    }
}

#[async_trait]
impl ProviderClient for FredClient {
    async fn observations(&self, series_id: &str, start: NaiveDate) -> Result<Series> {
        let response = self
            .fetch(
                series_id,
                &[("observation_start", start.format("%Y-%m-%d").to_string())],
            )
            .await?;

        to_series(series_id, response.observations)
    }

    async fn latest_value(&self, series_id: &str) -> Result<f64> {
        let response = self
            .fetch(
                series_id,
                &[
                    ("sort_order", "desc".to_string()),
                    ("limit", LATEST_LOOKUP_LIMIT.to_string()),
                ],
            )
            .await?;

        // Descending order, so the first published value is the latest.
        for observation in response.observations {
            if let Some(value) = parse_value(series_id, &observation)? {
                return Ok(value);
            }
        }

        Err(anyhow!("FRED returned no published value for {}", series_id))
    }
}

fn parse_response(series_id: &str, status: reqwest::StatusCode, body: &str) -> Result<FredResponse> {
    let parsed: Result<FredResponse, _> = serde_json::from_str(body);

    match parsed {
        Ok(response) => {
            if let Some(message) = response.error_message {
                return Err(anyhow!("FRED API error for {}: {}", series_id, message));
            }
            if !status.is_success() {
                return Err(anyhow!("FRED returned HTTP {} for {}", status, series_id));
            }
            Ok(response)
        }
        Err(_) if !status.is_success() => {
            Err(anyhow!("FRED returned HTTP {} for {}", status, series_id))
        }
        Err(e) => Err(e).with_context(|| format!("invalid FRED response for {}", series_id)),
    }
}

fn parse_value(series_id: &str, observation: &FredObservation) -> Result<Option<f64>> {
    let raw = observation.value.trim();
    if raw == MISSING_VALUE || raw.is_empty() {
        return Ok(None);
    }

    let value = raw.parse::<f64>().with_context(|| {
        format!(
            "invalid value {:?} for {} on {}",
            raw, series_id, observation.date
        )
    })?;

    Ok(Some(value))
}

fn to_series(series_id: &str, observations: Vec<FredObservation>) -> Result<Series> {
    let mut series = Series::new();

    for observation in &observations {
        if let Some(value) = parse_value(series_id, observation)? {
            series.insert(observation.date, value);
        }
    }

    debug!(
        series_id,
        published = series.len(),
        missing = observations.len() - series.len(),
        "parsed FRED series"
    );

    Ok(series)
}
