use crate::data::{Observation, ProviderClient, Series, SeriesIds};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Which days the aligned table contains.
///
/// * `Observed`: every date on which at least one raw series published
/// * `Daily`: every calendar day between the first and last published date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Calendar {
    #[default]
    Observed,
    Daily,
}

impl FromStr for Calendar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "observed" => Ok(Calendar::Observed),
            "daily" => Ok(Calendar::Daily),
            other => Err(format!(
                "unknown calendar {:?}, expected \"observed\" or \"daily\"",
                other
            )),
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::Observed => write!(f, "observed"),
            Calendar::Daily => write!(f, "daily"),
        }
    }
}

/// Aligns differently-sampled raw series onto one calendar.
///
/// Weekly series are forward-filled: a day with no publication inherits the
/// most recent prior value of that series. Days on which any of the three
/// series has no value yet (before its first publication) are dropped.
pub struct SeriesAligner {
    calendar: Calendar,
}

impl SeriesAligner {
    pub fn new(calendar: Calendar) -> Self {
        Self { calendar }
    }

    /// Fetches the three raw series from `start` onward and aligns them.
    ///
    /// # Errors
    /// Fails as a whole if any of the three fetches fails; no partial table
    /// is returned.
    pub async fn fetch_and_align<P>(
        &self,
        provider: &P,
        ids: &SeriesIds,
        start: NaiveDate,
    ) -> Result<Vec<Observation>>
    where
        P: ProviderClient + ?Sized,
    {
        let walcl = provider
            .observations(&ids.walcl, start)
            .await
            .with_context(|| format!("failed to fetch {}", ids.walcl))?;
        let on_rrp = provider
            .observations(&ids.on_rrp, start)
            .await
            .with_context(|| format!("failed to fetch {}", ids.on_rrp))?;
        let tga = provider
            .observations(&ids.tga, start)
            .await
            .with_context(|| format!("failed to fetch {}", ids.tga))?;

        let aligned = self.align(&walcl, &on_rrp, &tga);

        info!(
            start = %start,
            calendar = %self.calendar,
            walcl = walcl.len(),
            on_rrp = on_rrp.len(),
            tga = tga.len(),
            aligned = aligned.len(),
            "aligned raw series"
        );

        Ok(aligned)
    }

    /// Aligns three raw series and derives net liquidity for each day.
    ///
    /// # Returns
    /// Observations in ascending date order, one per calendar day on which
    /// all three raws are defined after forward-fill
    pub fn align(&self, walcl: &Series, on_rrp: &Series, tga: &Series) -> Vec<Observation> {
        self.calendar_days(&[walcl, on_rrp, tga])
            .into_iter()
            .filter_map(|date| {
                Some(Observation::new(
                    date,
                    value_as_of(walcl, date)?,
                    value_as_of(on_rrp, date)?,
                    value_as_of(tga, date)?,
                ))
            })
            .collect()
    }

    fn calendar_days(&self, series: &[&Series]) -> Vec<NaiveDate> {
        let observed: BTreeSet<NaiveDate> =
            series.iter().flat_map(|s| s.keys().copied()).collect();

        match self.calendar {
            Calendar::Observed => observed.into_iter().collect(),
            Calendar::Daily => match (observed.first(), observed.last()) {
                (Some(&first), Some(&last)) => first
                    .iter_days()
                    .take_while(|day| *day <= last)
                    .collect(),
                _ => Vec::new(),
            },
        }
    }
}

/// Most recent published value on or before `date`.
fn value_as_of(series: &Series, date: NaiveDate) -> Option<f64> {
    series.range(..=date).next_back().map(|(_, value)| *value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeProvider;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series(points: &[(NaiveDate, f64)]) -> Series {
        points.iter().copied().collect()
    }

    #[test]
    fn test_weekly_values_are_forward_filled() {
        // Weekly report on Wednesdays, daily series Monday to Friday.
        let walcl = series(&[(date(2024, 3, 6), 100.0), (date(2024, 3, 13), 110.0)]);
        let tga = series(&[(date(2024, 3, 6), 10.0), (date(2024, 3, 13), 12.0)]);
        let on_rrp: Series = (0..10)
            .map(|i| date(2024, 3, 6) + Duration::days(i))
            .filter(|d| chrono::Datelike::weekday(d).number_from_monday() <= 5)
            .map(|d| (d, 1.0))
            .collect();

        let aligned = SeriesAligner::new(Calendar::Observed).align(&walcl, &on_rrp, &tga);

        let dates: Vec<NaiveDate> = aligned.iter().map(|o| o.date).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 3, 6),
                date(2024, 3, 7),
                date(2024, 3, 8),
                date(2024, 3, 11),
                date(2024, 3, 12),
                date(2024, 3, 13),
                date(2024, 3, 14),
                date(2024, 3, 15),
            ]
        );

        let friday = aligned.iter().find(|o| o.date == date(2024, 3, 8)).unwrap();
        assert_eq!(friday.walcl, 100.0);
        assert_eq!(friday.tga, 10.0);
        assert_eq!(friday.net_liquidity, 100.0 - 1.0 - 10.0);

        let next_thursday = aligned.iter().find(|o| o.date == date(2024, 3, 14)).unwrap();
        assert_eq!(next_thursday.walcl, 110.0);
        assert_eq!(next_thursday.tga, 12.0);
    }

    #[test]
    fn test_daily_calendar_has_no_gaps() {
        let walcl = series(&[(date(2024, 3, 6), 100.0), (date(2024, 3, 13), 110.0)]);
        let on_rrp = series(&[(date(2024, 3, 6), 1.0), (date(2024, 3, 8), 2.0)]);
        let tga = series(&[(date(2024, 3, 6), 10.0)]);

        let aligned = SeriesAligner::new(Calendar::Daily).align(&walcl, &on_rrp, &tga);

        assert_eq!(aligned.len(), 8);
        for pair in aligned.windows(2) {
            assert_eq!(pair[1].date - pair[0].date, Duration::days(1));
        }

        // Weekend days repeat the Friday daily value and the last weekly value.
        let sunday = aligned.iter().find(|o| o.date == date(2024, 3, 10)).unwrap();
        assert_eq!(sunday.on_rrp, 2.0);
        assert_eq!(sunday.walcl, 100.0);
        assert_eq!(sunday.tga, 10.0);
    }

    #[test]
    fn test_days_before_first_publication_are_dropped() {
        let walcl = series(&[(date(2024, 1, 1), 100.0)]);
        let on_rrp = series(&[
            (date(2024, 1, 1), 1.0),
            (date(2024, 1, 2), 1.0),
            (date(2024, 1, 3), 1.0),
        ]);
        let tga = series(&[(date(2024, 1, 3), 10.0)]);

        let aligned = SeriesAligner::new(Calendar::Observed).align(&walcl, &on_rrp, &tga);

        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].date, date(2024, 1, 3));
    }

    #[test]
    fn test_empty_series_align_to_nothing() {
        let empty = Series::new();
        let aligned = SeriesAligner::new(Calendar::Daily).align(&empty, &empty, &empty);
        assert!(aligned.is_empty());
    }

    #[test]
    fn test_derived_value_invariant_holds_for_every_row() {
        let walcl = series(&[(date(2024, 2, 7), 7_600_000.5), (date(2024, 2, 14), 7_580_123.25)]);
        let on_rrp = series(&[
            (date(2024, 2, 7), 550_000.1),
            (date(2024, 2, 8), 541_000.7),
            (date(2024, 2, 12), 520_000.3),
            (date(2024, 2, 14), 510_000.9),
        ]);
        let tga = series(&[(date(2024, 2, 7), 800_000.0), (date(2024, 2, 14), 790_000.0)]);

        for obs in SeriesAligner::new(Calendar::Daily).align(&walcl, &on_rrp, &tga) {
            let expected = obs.walcl - obs.on_rrp - obs.tga;
            assert!((obs.net_liquidity - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_calendar_parses_from_str() {
        assert_eq!("daily".parse::<Calendar>().unwrap(), Calendar::Daily);
        assert_eq!(" Observed ".parse::<Calendar>().unwrap(), Calendar::Observed);
        assert!("weekly".parse::<Calendar>().is_err());
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_whole_alignment() {
        let ids = SeriesIds::default();
        let provider = FakeProvider::default()
            .with_series(&ids.walcl, series(&[(date(2024, 1, 3), 100.0)]))
            .with_series(&ids.on_rrp, series(&[(date(2024, 1, 3), 1.0)]))
            .failing_on(&ids.tga);

        let result = SeriesAligner::new(Calendar::Observed)
            .fetch_and_align(&provider, &ids, date(2024, 1, 1))
            .await;

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("WTREGEN"));
    }

    #[tokio::test]
    async fn test_fetch_respects_start_date() {
        let ids = SeriesIds::default();
        let provider = FakeProvider::default()
            .with_series(
                &ids.walcl,
                series(&[(date(2023, 12, 27), 90.0), (date(2024, 1, 3), 100.0)]),
            )
            .with_series(
                &ids.on_rrp,
                series(&[(date(2023, 12, 29), 1.0), (date(2024, 1, 3), 2.0)]),
            )
            .with_series(
                &ids.tga,
                series(&[(date(2023, 12, 27), 9.0), (date(2024, 1, 3), 10.0)]),
            );

        let aligned = SeriesAligner::new(Calendar::Observed)
            .fetch_and_align(&provider, &ids, date(2024, 1, 1))
            .await
            .unwrap();

        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].net_liquidity, 100.0 - 2.0 - 10.0);
    }
}
