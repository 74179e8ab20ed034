use chrono::NaiveDate;
use std::collections::BTreeMap;

/// A raw published series keyed by observation date.
///
/// Dates on which the provider reported no value are absent from the map
/// rather than stored as `NaN`.
pub type Series = BTreeMap<NaiveDate, f64>;

/// One day of the net liquidity index.
///
/// The three raw fields are the published inputs; `net_liquidity` is always
/// derived from them by [`Observation::new`] and is never set independently.
///
/// # Fields
/// * `date`: Calendar day of the observation, unique within a record
/// * `walcl`: Federal Reserve total assets
/// * `on_rrp`: Overnight reverse repurchase agreements
/// * `tga`: Treasury General Account balance
/// * `net_liquidity`: `walcl - on_rrp - tga`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub walcl: f64,
    pub on_rrp: f64,
    pub tga: f64,
    pub net_liquidity: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, walcl: f64, on_rrp: f64, tga: f64) -> Self {
        Self {
            date,
            walcl,
            on_rrp,
            tga,
            net_liquidity: walcl - on_rrp - tga,
        }
    }
}

/// Provider identifiers of the three raw series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesIds {
    pub walcl: String,
    pub on_rrp: String,
    pub tga: String,
}

impl Default for SeriesIds {
    fn default() -> Self {
        Self {
            walcl: "WALCL".to_string(),
            on_rrp: "RRPONTSYD".to_string(),
            tga: "WTREGEN".to_string(),
        }
    }
}
