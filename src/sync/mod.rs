pub mod differ;

pub use differ::new_observations;

use crate::config::SyncConfig;
use crate::data::{Observation, ProviderClient, SeriesAligner};
use crate::mirror::{MirrorClient, MirrorPublisher};
use crate::record::LocalRecord;
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate};
use tracing::{info, warn};

/// Summary of one synchronization run.
///
/// * `fetched`: Aligned observations produced from the provider
/// * `new_rows`: Observations whose date was not yet recorded
/// * `persisted`: Whether the local record was rewritten
/// * `mirrored`: Remote records created
/// * `skipped_remote`: New rows not mirrored because the date already existed remotely
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub fetched: usize,
    pub new_rows: usize,
    pub persisted: bool,
    pub mirrored: usize,
    pub skipped_remote: usize,
}

impl SyncReport {
    /// True when the provider had nothing the local record lacked.
    pub fn is_noop(&self) -> bool {
        self.new_rows == 0
    }
}

/// Keeps the local record and the remote mirror in step with the provider.
///
/// Each run loads the record, fetches from the provider, keeps only dates the
/// record lacks, rewrites the record and then mirrors the same new rows. The
/// record is persisted before mirroring, so a mirror failure leaves the local
/// record ahead of the remote.
pub struct Synchronizer<P, M> {
    config: SyncConfig,
    provider: P,
    mirror: M,
}

impl<P: ProviderClient, M: MirrorClient> Synchronizer<P, M> {
    pub fn new(config: SyncConfig, provider: P, mirror: M) -> Self {
        Self {
            config,
            provider,
            mirror,
        }
    }

    /// Synchronizes the full lookback window ending at `today`.
    ///
    /// # Errors
    /// Fails before any write if the record cannot be read or any series
    /// fetch fails; fails after the local write if mirroring fails
    pub async fn backfill(&self, today: NaiveDate) -> Result<SyncReport> {
        let start = today
            .checked_sub_signed(Duration::days(i64::from(self.config.lookback_days)))
            .ok_or_else(|| {
                anyhow!(
                    "lookback window of {} days is out of range",
                    self.config.lookback_days
                )
            })?;
        info!(%start, %today, lookback_days = self.config.lookback_days, "starting backfill");

        let record = LocalRecord::load(&self.config.csv_path)?;

        let aligned = SeriesAligner::new(self.config.calendar)
            .fetch_and_align(&self.provider, &self.config.series, start)
            .await?;

        self.apply(record, aligned).await
    }

    /// Records the latest released value of each series as `today`'s row.
    ///
    /// A run on a day that is already recorded writes nothing.
    ///
    /// # Errors
    /// Fails before any write if the record cannot be read or any latest
    /// value cannot be fetched; fails after the local write if mirroring fails
    pub async fn update(&self, today: NaiveDate) -> Result<SyncReport> {
        info!(%today, "starting update");

        let record = LocalRecord::load(&self.config.csv_path)?;
        let ids = &self.config.series;

        let walcl = self.latest(&ids.walcl).await?;
        let on_rrp = self.latest(&ids.on_rrp).await?;
        let tga = self.latest(&ids.tga).await?;

        let observation = Observation::new(today, walcl, on_rrp, tga);
        info!(
            date = %observation.date,
            walcl,
            on_rrp,
            tga,
            net_liquidity = observation.net_liquidity,
            "computed latest net liquidity"
        );
        if let Some(previous) = record.observations().last() {
            info!(
                since = %previous.date,
                change = observation.net_liquidity - previous.net_liquidity,
                "net liquidity change"
            );
        }

        self.apply(record, vec![observation]).await
    }

    async fn latest(&self, series_id: &str) -> Result<f64> {
        self.provider
            .latest_value(series_id)
            .await
            .with_context(|| format!("failed to fetch latest {}", series_id))
    }

    async fn apply(&self, mut record: LocalRecord, fetched: Vec<Observation>) -> Result<SyncReport> {
        let fresh = new_observations(&fetched, &record.dates());

        let mut report = SyncReport {
            fetched: fetched.len(),
            new_rows: fresh.len(),
            ..SyncReport::default()
        };

        if fresh.is_empty() {
            info!(
                path = %record.path().display(),
                rows = record.len(),
                "nothing new; local record already up to date"
            );
            return Ok(report);
        }

        if self.config.dry_run {
            for obs in &fresh {
                info!(
                    date = %obs.date,
                    net_liquidity = obs.net_liquidity,
                    "dry run: would append"
                );
            }
            return Ok(report);
        }

        record.append(&fresh);
        record.save()?;
        report.persisted = true;
        info!(
            added = fresh.len(),
            path = %record.path().display(),
            "appended new rows to local record"
        );

        let outcome = MirrorPublisher::new(&self.mirror, self.config.check_remote_existing)
            .publish(&fresh)
            .await
            .inspect_err(|_| {
                warn!("local record is ahead of the mirror until the failed rows are pushed")
            })?;

        report.mirrored = outcome.created;
        report.skipped_remote = outcome.skipped_existing;

        Ok(report)
    }
}
