use std::collections::{btree_map, BTreeMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Seconds spent per hostname during a single day.
pub type HostUsage = BTreeMap<String, u64>;

/// Per-day usage counters. Dates serialize as `YYYY-MM-DD` keys. Counters only ever grow, days are
/// created on first write and never removed.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Default)]
#[serde(transparent)]
pub struct DailyUsage(BTreeMap<NaiveDate, HostUsage>);

impl DailyUsage {
    /// Adds seconds to a hostname's counter for a day. Returns the new value.
    pub fn add(&mut self, day: NaiveDate, hostname: &str, seconds: u64) -> u64 {
        let counter = self
            .0
            .entry(day)
            .or_default()
            .entry(hostname.to_owned())
            .or_insert(0);
        *counter = counter.saturating_add(seconds);
        *counter
    }

    pub fn seconds(&self, day: NaiveDate, hostname: &str) -> u64 {
        self.0
            .get(&day)
            .and_then(|hosts| hosts.get(hostname))
            .copied()
            .unwrap_or(0)
    }

    /// Days from `start` to `end`, both inclusive.
    pub fn between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> btree_map::Range<'_, NaiveDate, HostUsage> {
        self.0.range(start..=end)
    }

    /// Sum of every counter for every day.
    pub fn total_seconds(&self) -> u64 {
        self.0.values().flat_map(|hosts| hosts.values()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// On-disk shape of the time data file.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimeDataDocument {
    #[serde(default)]
    pub time_data: DailyUsage,
}

/// Lists of hostnames the user marked as productive or unproductive. Maintained outside of the
/// daemon.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Default)]
pub struct WebsiteClassifications {
    #[serde(default)]
    pub productive: Vec<String>,
    #[serde(default)]
    pub unproductive: Vec<String>,
}

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Productive,
    Unproductive,
}

impl WebsiteClassifications {
    /// Sites nobody classified are treated as unproductive.
    pub fn category_of(&self, hostname: &str) -> Category {
        if self.productive.iter().any(|v| v == hostname) {
            Category::Productive
        } else {
            Category::Unproductive
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationsDocument {
    #[serde(default)]
    pub website_classifications: WebsiteClassifications,
}
