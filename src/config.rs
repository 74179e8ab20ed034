use crate::data::{Calendar, SeriesIds};
use anyhow::{anyhow, Context, Result};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Days of history requested by a backfill; wide enough to cover reporting
/// lag and holidays around a full year.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 400;
pub const DEFAULT_CSV_PATH: &str = "data/liquidity_history.csv";
pub const DEFAULT_FRED_BASE_URL: &str = "https://api.stlouisfed.org";
pub const DEFAULT_NOTION_BASE_URL: &str = "https://api.notion.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Credentials and endpoint for the FRED API.
#[derive(Debug, Clone)]
pub struct FredConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Credentials and target database for the Notion mirror.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub token: String,
    pub database_id: String,
    pub base_url: String,
}

/// Options that shape one synchronization run.
///
/// # Fields
/// * `csv_path`: Location of the local record
/// * `series`: Provider identifiers of the three raw series
/// * `lookback_days`: Backfill window, counted back from the run date
/// * `calendar`: Alignment calendar for backfills
/// * `check_remote_existing`: Skip mirror creation for dates already present remotely
/// * `dry_run`: Compute and report new rows without writing anywhere
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub csv_path: PathBuf,
    pub series: SeriesIds,
    pub lookback_days: u32,
    pub calendar: Calendar,
    pub check_remote_existing: bool,
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            series: SeriesIds::default(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            calendar: Calendar::default(),
            check_remote_existing: false,
            dry_run: false,
        }
    }
}

/// Full process configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub fred: FredConfig,
    pub notion: NotionConfig,
    pub sync: SyncConfig,
    pub request_timeout: Duration,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// Required: `FRED_API_KEY`, `NOTION_TOKEN`, `NOTION_DB_ID`.
    /// Optional: `LIQUIDITY_CSV_PATH`, `LIQUIDITY_LOOKBACK_DAYS`,
    /// `FRED_BASE_URL`, `NOTION_BASE_URL`, `HTTP_TIMEOUT_SECS`.
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or an optional one
    /// cannot be parsed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{} must be set in environment", key))
        };

        let defaults = SyncConfig::default();
        let sync = SyncConfig {
            csv_path: lookup("LIQUIDITY_CSV_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.csv_path),
            lookback_days: parse_optional(&lookup, "LIQUIDITY_LOOKBACK_DAYS")?
                .unwrap_or(defaults.lookback_days),
            ..defaults
        };

        let timeout_secs =
            parse_optional(&lookup, "HTTP_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            fred: FredConfig {
                api_key: required("FRED_API_KEY")?,
                base_url: lookup("FRED_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_FRED_BASE_URL.to_string()),
            },
            notion: NotionConfig {
                token: required("NOTION_TOKEN")?,
                database_id: required("NOTION_DB_ID")?,
                base_url: lookup("NOTION_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_NOTION_BASE_URL.to_string()),
            },
            sync,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_optional<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("invalid value {:?} for {}", raw, key)),
        None => Ok(None),
    }
}
