use crate::data::Observation;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Tolerance when comparing a stored net liquidity column against the raws.
const DERIVED_TOLERANCE: f64 = 1e-6;

/// One CSV row of the local record.
#[derive(Debug, Serialize, Deserialize)]
struct RecordRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "WALCL")]
    walcl: f64,
    #[serde(rename = "ON_RRP")]
    on_rrp: f64,
    #[serde(rename = "TGA")]
    tga: f64,
    #[serde(rename = "Net_Liquidity")]
    net_liquidity: f64,
}

impl From<&Observation> for RecordRow {
    fn from(obs: &Observation) -> Self {
        Self {
            date: obs.date,
            walcl: obs.walcl,
            on_rrp: obs.on_rrp,
            tga: obs.tga,
            net_liquidity: obs.net_liquidity,
        }
    }
}

/// The durable history of net liquidity observations, stored as CSV.
///
/// Loaded in full at start, appended to in memory and written back in full;
/// the file on disk is always overwritten, never appended to.
pub struct LocalRecord {
    path: PathBuf,
    observations: Vec<Observation>,
}

impl LocalRecord {
    /// Loads the record at `path`.
    ///
    /// A missing or empty file is an empty record. Net liquidity is recomputed
    /// from the raw columns; a stored value that disagrees is logged and
    /// replaced.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no local record yet, starting empty");
                return Ok(Self {
                    path,
                    observations: Vec::new(),
                });
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to open {}", path.display()));
            }
        };

        let mut reader = csv::Reader::from_reader(file);
        let mut observations = Vec::new();

        for (index, row) in reader.deserialize::<RecordRow>().enumerate() {
            let row = row.with_context(|| {
                format!("invalid row {} in {}", index + 1, path.display())
            })?;

            let obs = Observation::new(row.date, row.walcl, row.on_rrp, row.tga);
            if (obs.net_liquidity - row.net_liquidity).abs() > DERIVED_TOLERANCE {
                warn!(
                    date = %row.date,
                    stored = row.net_liquidity,
                    recomputed = obs.net_liquidity,
                    "stored net liquidity disagrees with raw columns"
                );
            }
            observations.push(obs);
        }

        debug!(path = %path.display(), rows = observations.len(), "loaded local record");

        Ok(Self { path, observations })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Dates already present in the record.
    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    /// Merges `new` into the record: deduplicated by date, later rows winning,
    /// sorted ascending.
    pub fn append(&mut self, new: &[Observation]) {
        let existing = std::mem::take(&mut self.observations);
        self.observations = merge(existing, new);
    }

    /// Writes the whole record to disk, replacing any previous contents.
    ///
    /// Creates the parent directory if it does not exist.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut writer = csv::Writer::from_path(&self.path)
            .with_context(|| format!("failed to open {} for writing", self.path.display()))?;

        for obs in &self.observations {
            writer
                .serialize(RecordRow::from(obs))
                .with_context(|| format!("failed to write row for {}", obs.date))?;
        }
        writer
            .flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;

        info!(
            path = %self.path.display(),
            rows = self.observations.len(),
            "saved local record"
        );

        Ok(())
    }
}

/// Concatenates `existing` and `new`, keeps the last row per date and sorts.
pub fn merge(existing: Vec<Observation>, new: &[Observation]) -> Vec<Observation> {
    let mut by_date = BTreeMap::new();

    for obs in existing.into_iter().chain(new.iter().copied()) {
        by_date.insert(obs.date, obs);
    }

    by_date.into_values().collect()
}
