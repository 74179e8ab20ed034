pub mod notion;

pub use notion::NotionClient;

use crate::data::Observation;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info};

/// External database that receives one record per new observation.
#[async_trait]
pub trait MirrorClient: Send + Sync {
    /// Creates one remote record holding all five fields of `observation`.
    async fn create(&self, observation: &Observation) -> Result<()>;

    /// Reports whether a record for `date` already exists remotely.
    async fn exists(&self, date: NaiveDate) -> Result<bool>;
}

/// Counts from one publishing pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishOutcome {
    pub created: usize,
    pub skipped_existing: usize,
}

/// Pushes new observations to a [`MirrorClient`], one creation per row.
///
/// Creations are independent: the first failure stops the pass and is
/// returned, rows already created stay created.
pub struct MirrorPublisher<'a, M: ?Sized> {
    client: &'a M,
    check_existing: bool,
}

impl<'a, M: MirrorClient + ?Sized> MirrorPublisher<'a, M> {
    pub fn new(client: &'a M, check_existing: bool) -> Self {
        Self {
            client,
            check_existing,
        }
    }

    /// Publishes `observations` in ascending date order.
    ///
    /// # Errors
    /// Returns the first failed existence check or creation, naming its date
    pub async fn publish(&self, observations: &[Observation]) -> Result<PublishOutcome> {
        let mut ordered = observations.to_vec();
        ordered.sort_by_key(|o| o.date);

        let mut outcome = PublishOutcome::default();

        for obs in &ordered {
            if self.check_existing {
                let exists = self
                    .client
                    .exists(obs.date)
                    .await
                    .with_context(|| format!("failed to check mirror for {}", obs.date))?;
                if exists {
                    debug!(date = %obs.date, "already mirrored, skipping");
                    outcome.skipped_existing += 1;
                    continue;
                }
            }

            self.client.create(obs).await.with_context(|| {
                format!(
                    "failed to mirror {} after {} of {} rows",
                    obs.date,
                    outcome.created,
                    ordered.len()
                )
            })?;
            outcome.created += 1;
        }

        info!(
            created = outcome.created,
            skipped = outcome.skipped_existing,
            "mirror publish finished"
        );

        Ok(outcome)
    }
}
