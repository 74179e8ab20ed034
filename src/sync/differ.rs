use crate::data::Observation;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Observations whose date is not yet recorded, ascending by date.
///
/// If `aligned` repeats a date, the last occurrence is kept so the result
/// agrees with the record's last-write-wins merge.
pub fn new_observations(
    aligned: &[Observation],
    existing: &BTreeSet<NaiveDate>,
) -> Vec<Observation> {
    let mut fresh: Vec<Observation> = aligned
        .iter()
        .filter(|obs| !existing.contains(&obs.date))
        .copied()
        .collect();

    // Stable sort keeps input order among equal dates; dedup_by_key keeps the
    // first of each run, so reverse around it to keep the last.
    fresh.sort_by_key(|obs| obs.date);
    fresh.reverse();
    fresh.dedup_by_key(|obs| obs.date);
    fresh.reverse();

    fresh
}
