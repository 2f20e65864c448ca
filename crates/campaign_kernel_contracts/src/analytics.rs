#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionCount {
    pub emirate: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourBucket {
    /// `YYYY-MM-DD HH:00`, UTC; sorts lexicographically in time order.
    pub hour_label: String,
    pub count: u64,
}

/// Dashboard statistics derived from a full scan of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationSnapshot {
    pub total_submissions: u64,
    pub submissions_by_emirate: Vec<RegionCount>,
    pub submissions_by_language: BTreeMap<String, u64>,
    pub submissions_over_time: Vec<HourBucket>,
    pub peak_hour: Option<HourBucket>,
    pub emirate_colors: BTreeMap<String, String>,
}

impl AggregationSnapshot {
    pub fn region_count(&self, label: &str) -> u64 {
        self.submissions_by_emirate
            .iter()
            .find(|r| r.emirate == label)
            .map(|r| r.count)
            .unwrap_or(0)
    }

    pub fn language_count(&self, tag: &str) -> u64 {
        self.submissions_by_language.get(tag).copied().unwrap_or(0)
    }
}
