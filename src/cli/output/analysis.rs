use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    daemon::storage::entities::{Category, DailyUsage, WebsiteClassifications},
    utils::percentage::{seconds_percentage, Percentage},
};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SiteUsage {
    pub hostname: String,
    pub seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct UsageReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub productive: Vec<SiteUsage>,
    pub unproductive: Vec<SiteUsage>,
    pub productive_seconds: u64,
    pub unproductive_seconds: u64,
    pub total_seconds: u64,
}

/// Sums seconds per site from `start` to `end` and splits them by category. Totals include every
/// site, while the lists only keep sites taking at least `min_percentage` of the total.
pub fn analyze_usage(
    usage: &DailyUsage,
    start: NaiveDate,
    end: NaiveDate,
    classifications: &WebsiteClassifications,
    min_percentage: Percentage,
) -> UsageReport {
    let mut sites = HashMap::<&str, u64>::new();
    for (_, hosts) in usage.between(start, end) {
        for (hostname, seconds) in hosts {
            let total = sites.entry(hostname.as_str()).or_default();
            *total = total.saturating_add(*seconds);
        }
    }

    let total_seconds: u64 = sites.values().sum();

    let mut report = UsageReport {
        start,
        end,
        productive: vec![],
        unproductive: vec![],
        productive_seconds: 0,
        unproductive_seconds: 0,
        total_seconds,
    };

    for (hostname, seconds) in sites {
        let (list, sum) = match classifications.category_of(hostname) {
            Category::Productive => (&mut report.productive, &mut report.productive_seconds),
            Category::Unproductive => (&mut report.unproductive, &mut report.unproductive_seconds),
        };
        *sum += seconds;
        if seconds_percentage(seconds, total_seconds) >= min_percentage {
            list.push(SiteUsage {
                hostname: hostname.to_owned(),
                seconds,
            });
        }
    }

    for list in [&mut report.productive, &mut report.unproductive] {
        list.sort_by(|a, b| {
            b.seconds
                .cmp(&a.seconds)
                .then_with(|| a.hostname.cmp(&b.hostname))
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::{
        daemon::storage::entities::{DailyUsage, WebsiteClassifications},
        utils::percentage::Percentage,
    };

    use super::{analyze_usage, SiteUsage};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 7, d).unwrap()
    }

    fn site(hostname: &str, seconds: u64) -> SiteUsage {
        SiteUsage {
            hostname: hostname.into(),
            seconds,
        }
    }

    fn classifications() -> WebsiteClassifications {
        WebsiteClassifications {
            productive: vec!["docs.rs".into(), "github.com".into()],
            unproductive: vec!["youtube.com".into()],
        }
    }

    #[test]
    fn test_report_splits_by_category() {
        let mut usage = DailyUsage::default();
        usage.add(day(4), "docs.rs", 100);
        usage.add(day(4), "youtube.com", 300);
        usage.add(day(4), "example.com", 50);
        usage.add(day(4), "github.com", 100);

        let report = analyze_usage(&usage, day(4), day(4), &classifications(), Percentage::ZERO);

        assert_eq!(report.productive, vec![site("docs.rs", 100), site("github.com", 100)]);
        assert_eq!(
            report.unproductive,
            vec![site("youtube.com", 300), site("example.com", 50)]
        );
        assert_eq!(report.productive_seconds, 200);
        assert_eq!(report.unproductive_seconds, 350);
        assert_eq!(report.total_seconds, 550);
    }

    #[test]
    fn test_report_sums_days_in_range() {
        let mut usage = DailyUsage::default();
        usage.add(day(3), "docs.rs", 1000);
        usage.add(day(4), "docs.rs", 10);
        usage.add(day(5), "docs.rs", 20);
        usage.add(day(6), "docs.rs", 1000);

        let report = analyze_usage(&usage, day(4), day(5), &classifications(), Percentage::ZERO);

        assert_eq!(report.productive, vec![site("docs.rs", 30)]);
        assert_eq!(report.total_seconds, 30);
    }

    #[test]
    fn test_small_sites_are_hidden_but_counted() {
        let mut usage = DailyUsage::default();
        usage.add(day(4), "youtube.com", 995);
        usage.add(day(4), "example.com", 5);

        let min = Percentage::new_opt(1.).unwrap();
        let report = analyze_usage(&usage, day(4), day(4), &classifications(), min);

        assert_eq!(report.unproductive, vec![site("youtube.com", 995)]);
        assert_eq!(report.unproductive_seconds, 1000);
    }

    #[test]
    fn test_empty_range() {
        let report = analyze_usage(
            &DailyUsage::default(),
            day(4),
            day(5),
            &classifications(),
            Percentage::ZERO,
        );
        assert!(report.productive.is_empty());
        assert!(report.unproductive.is_empty());
        assert_eq!(report.total_seconds, 0);
    }
}
