//! In-memory provider and mirror used by unit tests.

use crate::data::{Observation, ProviderClient, Series};
use crate::mirror::MirrorClient;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeProvider {
    series: HashMap<String, Series>,
    latest: HashMap<String, f64>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn with_series(mut self, id: &str, series: Series) -> Self {
        self.series.insert(id.to_string(), series);
        self
    }

    pub fn with_latest(mut self, id: &str, value: f64) -> Self {
        self.latest.insert(id.to_string(), value);
        self
    }

    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record_call(&self, id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(id.to_string());
        if self.failing.contains(id) {
            return Err(anyhow!("provider unavailable for {}", id));
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    async fn observations(&self, series_id: &str, start: NaiveDate) -> Result<Series> {
        self.record_call(series_id)?;
        Ok(self
            .series
            .get(series_id)
            .map(|s| s.range(start..).map(|(d, v)| (*d, *v)).collect())
            .unwrap_or_default())
    }

    async fn latest_value(&self, series_id: &str) -> Result<f64> {
        self.record_call(series_id)?;
        self.latest
            .get(series_id)
            .copied()
            .ok_or_else(|| anyhow!("no latest value for {}", series_id))
    }
}

/// Mirror that records created observations; can fail after N creations.
#[derive(Default)]
pub struct FakeMirror {
    created: Mutex<Vec<Observation>>,
    remote_dates: Mutex<BTreeSet<NaiveDate>>,
    fail_after: Option<usize>,
}

impl FakeMirror {
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::default()
        }
    }

    pub fn with_remote_dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            remote_dates: Mutex::new(dates.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<Observation> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl MirrorClient for FakeMirror {
    async fn create(&self, observation: &Observation) -> Result<()> {
        let mut created = self.created.lock().unwrap();
        if self.fail_after.is_some_and(|limit| created.len() >= limit) {
            return Err(anyhow!("mirror rejected {}", observation.date));
        }
        created.push(*observation);
        self.remote_dates.lock().unwrap().insert(observation.date);
        Ok(())
    }

    async fn exists(&self, date: NaiveDate) -> Result<bool> {
        Ok(self.remote_dates.lock().unwrap().contains(&date))
    }
}
