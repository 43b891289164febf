use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// Calendar day of a moment in the local timezone. Days are always counted in local time.
pub fn local_day(moment: DateTime<Utc>) -> NaiveDate {
    moment.with_timezone(&Local).date_naive()
}

/// Returns the first moment of a local day. Some timezones skip midnight during DST transitions,
/// in which case the earliest existing time during the first hours of the day is used.
pub fn local_day_start(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=3)
        .find_map(|hour| {
            Local
                .from_local_datetime(&(midnight + Duration::hours(hour)))
                .earliest()
        })
        .map(|v| v.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Returns start of the local day following `moment`.
pub fn next_day_start(moment: DateTime<Utc>) -> DateTime<Utc> {
    match local_day(moment).succ_opt() {
        Some(next) => local_day_start(next),
        None => moment,
    }
}

/// Whole seconds contained in a duration. Negative durations count as zero.
pub fn whole_seconds(duration: Duration) -> u64 {
    u64::try_from(duration.num_seconds()).unwrap_or(0)
}

/// Formats seconds the way reports show them: `HH:MM:SS`.
pub fn format_seconds(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
