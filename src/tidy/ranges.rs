use crate::tidy::project::TimeRange;
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_RANGE_GAP_DAYS: u32 = 180;

fn range_label(start: NaiveDate, end: NaiveDate) -> String {
    if start.year() == end.year() {
        format!("{}", start.year())
    } else {
        format!("{}-{}", start.year(), end.year())
    }
}

/// Cluster observed dates into chronological, non-overlapping ranges.
///
/// Dates are sorted and deduplicated; a gap of more than `gap_days` between
/// two consecutive dates closes the current range. Labels are `YYYY` or
/// `YYYY-YYYY`; a label seen earlier in the same project gets `_2`, `_3`, ...
pub fn derive_time_ranges<I>(dates: I, gap_days: u32) -> Vec<TimeRange>
where
    I: IntoIterator<Item = NaiveDate>,
{
    let sorted: BTreeSet<NaiveDate> = dates.into_iter().collect();
    let mut clusters: Vec<(NaiveDate, NaiveDate)> = Vec::new();
    for date in sorted {
        match clusters.last_mut() {
            Some((_, end)) if (date - *end).num_days() <= i64::from(gap_days) => *end = date,
            _ => clusters.push((date, date)),
        }
    }

    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    clusters
        .into_iter()
        .map(|(start, end)| {
            let base = range_label(start, end);
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            let label = if *count == 1 {
                base
            } else {
                format!("{base}_{count}")
            };
            TimeRange { label, start, end }
        })
        .collect()
}
