#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use campaign_kernel_contracts::analytics::{AggregationSnapshot, HourBucket, RegionCount};
use campaign_kernel_contracts::region::{CanonicalRegion, LanguageBucket};
use campaign_kernel_contracts::submission::SubmissionRecord;
use chrono::{DateTime, Timelike, Utc};

use crate::region::infer_language;

fn hour_label(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:00").to_string()
}

/// Pure fold over a record snapshot. Region, language and hourly counts each
/// sum to `total_submissions`.
pub fn compute_snapshot<'a, I>(records: I) -> AggregationSnapshot
where
    I: IntoIterator<Item = &'a SubmissionRecord>,
{
    let mut total = 0u64;
    let mut by_region: BTreeMap<CanonicalRegion, u64> = BTreeMap::new();
    let mut by_language: BTreeMap<LanguageBucket, u64> = BTreeMap::new();
    // Keyed by the hour-truncated instant so ordering is chronological.
    let mut by_hour: BTreeMap<DateTime<Utc>, u64> = BTreeMap::new();

    for record in records {
        total += 1;
        // Stored labels are already normalized; unlisted text counts as Unknown.
        let region =
            CanonicalRegion::from_label(&record.emirate).unwrap_or(CanonicalRegion::Unknown);
        *by_region.entry(region).or_default() += 1;

        let language = infer_language([
            record.region_raw.as_str(),
            record.name.as_str(),
            record.email.as_str(),
        ]);
        *by_language.entry(language).or_default() += 1;

        let hour = record
            .submitted_at
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(record.submitted_at);
        *by_hour.entry(hour).or_default() += 1;
    }

    let mut submissions_by_emirate: Vec<RegionCount> = CanonicalRegion::all()
        .iter()
        .filter_map(|region| {
            by_region.get(region).map(|count| RegionCount {
                emirate: region.as_str().to_string(),
                count: *count,
            })
        })
        .collect();
    // Stable sort keeps declaration order among equal counts.
    submissions_by_emirate.sort_by(|a, b| b.count.cmp(&a.count));

    let submissions_by_language = [LanguageBucket::En, LanguageBucket::Ar]
        .into_iter()
        .map(|lang| {
            (
                lang.as_str().to_string(),
                by_language.get(&lang).copied().unwrap_or(0),
            )
        })
        .collect();

    let submissions_over_time: Vec<HourBucket> = by_hour
        .into_iter()
        .map(|(hour, count)| HourBucket {
            hour_label: hour_label(hour),
            count,
        })
        .collect();

    let mut peak_hour: Option<HourBucket> = None;
    for bucket in &submissions_over_time {
        if peak_hour.as_ref().map_or(true, |peak| bucket.count > peak.count) {
            peak_hour = Some(bucket.clone());
        }
    }

    let emirate_colors = CanonicalRegion::all()
        .iter()
        .map(|region| {
            (
                region.as_str().to_string(),
                region.display_color().to_string(),
            )
        })
        .collect();

    AggregationSnapshot {
        total_submissions: total,
        submissions_by_emirate,
        submissions_by_language,
        submissions_over_time,
        peak_hour,
        emirate_colors,
    }
}
