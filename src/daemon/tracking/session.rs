use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::utils::time::{local_day, local_day_start, whole_seconds};

use super::hostname::Hostname;

/// Identity of a browser tab as reported by the browser.
pub type TabId = i64;

/// Seconds that have to be added to a hostname's counter for a day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flush {
    pub hostname: Hostname,
    pub day: NaiveDate,
    pub seconds: u64,
}

/// Open interval for a single hostname. `started` marks the first moment that wasn't flushed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    hostname: Hostname,
    started: DateTime<Utc>,
    day: NaiveDate,
}

impl ActiveSession {
    fn new(hostname: Hostname, now: DateTime<Utc>) -> Self {
        Self {
            hostname,
            started: now,
            day: local_day(now),
        }
    }

    pub fn hostname(&self) -> &Hostname {
        &self.hostname
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    fn flush(&self, day: NaiveDate, seconds: u64) -> Option<Flush> {
        (seconds > 0).then(|| Flush {
            hostname: self.hostname.clone(),
            day,
            seconds,
        })
    }

    /// Keeps `started` in the past and on the tracked day. When the day changed, seconds up to the
    /// end of the tracked day are returned for that day and the session restarts at the start of
    /// the current day.
    fn catch_up(&mut self, now: DateTime<Utc>) -> Option<Flush> {
        if now < self.started {
            warn!(
                "Clock moved backwards by {}ms while tracking {}",
                (self.started - now).num_milliseconds(),
                self.hostname
            );
            self.started = now;
        }

        let today = local_day(now);
        if today == self.day {
            return None;
        }
        if today < self.day {
            warn!("Day moved backwards from {} to {today}", self.day);
            self.day = today;
            self.started = now;
            return None;
        }

        let day_end = self
            .day
            .succ_opt()
            .map(local_day_start)
            .unwrap_or(now);
        let boundary = local_day_start(today).min(now);
        if boundary > day_end {
            warn!(
                "Skipped {} days while tracking {}",
                (today - self.day).num_days() - 1,
                self.hostname
            );
        }

        let flush = self.flush(self.day, whole_seconds(day_end - self.started));
        debug!("Rolling {} over from {} to {today}", self.hostname, self.day);
        self.day = today;
        self.started = boundary.max(self.started);
        flush
    }

    /// Takes whole seconds since `started`. The sub-second remainder stays in the session.
    fn take_elapsed(&mut self, now: DateTime<Utc>) -> Option<Flush> {
        let seconds = whole_seconds(now - self.started);
        let flush = self.flush(self.day, seconds)?;
        self.started += Duration::seconds(seconds as i64);
        Some(flush)
    }

    fn settle(&mut self, now: DateTime<Utc>) -> Vec<Flush> {
        let rollover = self.catch_up(now);
        rollover.into_iter().chain(self.take_elapsed(now)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Tracking(ActiveSession),
}

/// State machine deciding which hostname time is attributed to. It doesn't perform any io, every
/// transition returns the flushes that have to be written.
#[derive(Debug, Default)]
pub struct TrackingSession {
    tab: Option<TabId>,
    state: SessionState,
}

impl TrackingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.tab
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Tracking(active) => Some(active),
        }
    }

    pub fn hostname(&self) -> Option<&Hostname> {
        self.active().map(ActiveSession::hostname)
    }

    /// Moves the session to `hostname` shown in `tab`. Returns `None` when the same page of the
    /// same tab is reported again, otherwise the flushes closing the previous session.
    pub fn navigate(
        &mut self,
        tab: TabId,
        hostname: Option<Hostname>,
        now: DateTime<Utc>,
    ) -> Option<Vec<Flush>> {
        if self.tab == Some(tab) && self.hostname() == hostname.as_ref() {
            return None;
        }

        let flushes = self.close(now);
        self.tab = Some(tab);
        self.state = match hostname {
            Some(hostname) => SessionState::Tracking(ActiveSession::new(hostname, now)),
            None => SessionState::Idle,
        };
        Some(flushes)
    }

    /// Periodic flush of the current session.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Flush> {
        match &mut self.state {
            SessionState::Idle => vec![],
            SessionState::Tracking(active) => active.settle(now),
        }
    }

    /// Moves the session to the current day if it is still on a previous one.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> Vec<Flush> {
        match &mut self.state {
            SessionState::Idle => vec![],
            SessionState::Tracking(active) => active.catch_up(now).into_iter().collect(),
        }
    }

    /// Flushes and stops tracking until the next navigation.
    pub fn suspend(&mut self, now: DateTime<Utc>) -> Vec<Flush> {
        let flushes = self.close(now);
        self.tab = None;
        flushes
    }

    /// Drops the session without flushing. Used when the browser starts again, since the time it
    /// wasn't running shouldn't be attributed to anything.
    pub fn reset(&mut self) {
        if let Some(active) = self.active() {
            debug!("Discarding session for {} on reset", active.hostname);
        }
        *self = Self::default();
    }

    fn close(&mut self, now: DateTime<Utc>) -> Vec<Flush> {
        match std::mem::take(&mut self.state) {
            SessionState::Idle => vec![],
            SessionState::Tracking(mut active) => active.settle(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};

    use crate::daemon::tracking::hostname::{resolve_hostname, Hostname};

    use super::{Flush, SessionState, TrackingSession};

    fn host(name: &str) -> Hostname {
        resolve_hostname(Some(&format!("https://{name}/"))).unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2018, 7, day, hour, minute, second)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 7, day).unwrap()
    }

    fn flush(name: &str, day: u32, seconds: u64) -> Flush {
        Flush {
            hostname: host(name),
            day: date(day),
            seconds,
        }
    }

    #[test]
    fn test_first_navigation_starts_tracking() {
        let mut session = TrackingSession::new();
        let t0 = at(4, 12, 0, 0);

        assert_eq!(session.navigate(1, Some(host("a.com")), t0), Some(vec![]));

        let active = session.active().unwrap();
        assert_eq!(active.hostname(), &host("a.com"));
        assert_eq!(active.started(), t0);
        assert_eq!(active.day(), date(4));
        assert_eq!(session.active_tab(), Some(1));
    }

    #[test]
    fn test_switch_flushes_previous_hostname() {
        let mut session = TrackingSession::new();
        let t0 = at(4, 12, 0, 0);
        session.navigate(1, Some(host("a.com")), t0);

        let flushes = session.navigate(2, Some(host("b.com")), t0 + Duration::seconds(125));

        assert_eq!(flushes, Some(vec![flush("a.com", 4, 125)]));
        assert_eq!(session.hostname(), Some(&host("b.com")));
        assert_eq!(session.active().unwrap().started(), t0 + Duration::seconds(125));
    }

    #[test]
    fn test_same_page_in_same_tab_is_ignored() {
        let mut session = TrackingSession::new();
        let t0 = at(4, 12, 0, 0);
        session.navigate(1, Some(host("a.com")), t0);

        assert_eq!(session.navigate(1, Some(host("a.com")), t0 + Duration::seconds(5)), None);
        assert_eq!(session.navigate(1, Some(host("a.com")), t0 + Duration::seconds(9)), None);
        assert_eq!(session.active().unwrap().started(), t0);

        assert_eq!(
            session.tick(t0 + Duration::seconds(10)),
            vec![flush("a.com", 4, 10)]
        );
    }

    #[test]
    fn test_same_hostname_in_other_tab_restarts() {
        let mut session = TrackingSession::new();
        let t0 = at(4, 12, 0, 0);
        session.navigate(1, Some(host("a.com")), t0);

        let flushes = session.navigate(2, Some(host("a.com")), t0 + Duration::seconds(3));

        assert_eq!(flushes, Some(vec![flush("a.com", 4, 3)]));
        assert_eq!(session.active_tab(), Some(2));
    }

    #[test]
    fn test_untrackable_page_goes_idle() {
        let mut session = TrackingSession::new();
        let t0 = at(4, 12, 0, 0);
        session.navigate(1, Some(host("a.com")), t0);

        let flushes = session.navigate(1, None, t0 + Duration::seconds(7));

        assert_eq!(flushes, Some(vec![flush("a.com", 4, 7)]));
        assert_eq!(session.state(), &SessionState::Idle);
        assert_eq!(session.active_tab(), Some(1));
        assert_eq!(session.navigate(1, None, t0 + Duration::seconds(8)), None);
        assert!(session.tick(t0 + Duration::seconds(20)).is_empty());
    }

    #[test]
    fn test_tick_keeps_sub_second_remainder() {
        let mut session = TrackingSession::new();
        let t0 = at(4, 12, 0, 0);
        session.navigate(1, Some(host("a.com")), t0);

        let mut total = 0;
        for step in 1..=10 {
            let now = t0 + Duration::milliseconds(1500 * step);
            total += session.tick(now).iter().map(|v| v.seconds).sum::<u64>();
        }

        assert_eq!(total, 15);
        assert_eq!(session.active().unwrap().started(), t0 + Duration::seconds(15));
    }

    #[test]
    fn test_tick_without_whole_second_does_nothing() {
        let mut session = TrackingSession::new();
        let t0 = at(4, 12, 0, 0);
        session.navigate(1, Some(host("a.com")), t0);

        assert!(session.tick(t0 + Duration::milliseconds(999)).is_empty());
        assert_eq!(session.active().unwrap().started(), t0);
    }

    #[test]
    fn test_midnight_split_with_ticks() {
        let mut session = TrackingSession::new();
        let start = at(4, 23, 59, 50);
        session.navigate(1, Some(host("a.com")), start);

        let mut flushes = vec![];
        for second in 1..=20 {
            flushes.extend(session.tick(start + Duration::seconds(second)));
        }

        let on = |day| -> u64 {
            flushes
                .iter()
                .filter(|v| v.day == date(day))
                .map(|v| v.seconds)
                .sum()
        };
        assert_eq!(on(4), 10);
        assert_eq!(on(5), 10);
    }

    #[test]
    fn test_midnight_split_without_ticks() {
        let mut session = TrackingSession::new();
        session.navigate(1, Some(host("a.com")), at(4, 23, 59, 50));

        let flushes = session.navigate(1, Some(host("b.com")), at(5, 0, 0, 10));

        assert_eq!(
            flushes,
            Some(vec![flush("a.com", 4, 10), flush("a.com", 5, 10)])
        );
    }

    #[test]
    fn test_roll_over_restarts_at_boundary() {
        let mut session = TrackingSession::new();
        session.navigate(1, Some(host("a.com")), at(4, 23, 55, 0));

        // A late poll still attributes the first minutes of the day to the new day.
        let flushes = session.roll_over(at(5, 0, 4, 0));

        assert_eq!(flushes, vec![flush("a.com", 4, 300)]);
        let active = session.active().unwrap();
        assert_eq!(active.day(), date(5));
        assert_eq!(active.started(), at(5, 0, 0, 0));
        assert_eq!(session.tick(at(5, 0, 4, 0)), vec![flush("a.com", 5, 240)]);
    }

    #[test]
    fn test_roll_over_on_same_day_does_nothing() {
        let mut session = TrackingSession::new();
        let t0 = at(4, 12, 0, 0);
        session.navigate(1, Some(host("a.com")), t0);

        assert!(session.roll_over(t0 + Duration::minutes(5)).is_empty());
        assert_eq!(session.active().unwrap().started(), t0);
    }

    #[test]
    fn test_clock_moving_backwards_is_not_counted() {
        let mut session = TrackingSession::new();
        let t0 = at(4, 12, 0, 0);
        session.navigate(1, Some(host("a.com")), t0);

        assert!(session.tick(t0 - Duration::minutes(10)).is_empty());
        assert_eq!(session.active().unwrap().started(), t0 - Duration::minutes(10));
        assert_eq!(
            session.tick(t0 - Duration::minutes(10) + Duration::seconds(2)),
            vec![flush("a.com", 4, 2)]
        );
    }

    #[test]
    fn test_clock_moving_to_previous_day() {
        let mut session = TrackingSession::new();
        session.navigate(1, Some(host("a.com")), at(5, 0, 0, 30));

        assert!(session.tick(at(4, 23, 0, 0)).is_empty());
        assert_eq!(session.active().unwrap().day(), date(4));
        assert_eq!(session.tick(at(4, 23, 0, 5)), vec![flush("a.com", 4, 5)]);
    }

    #[test]
    fn test_suspend_flushes_and_forgets_tab() {
        let mut session = TrackingSession::new();
        let t0 = at(4, 12, 0, 0);
        session.navigate(1, Some(host("a.com")), t0);

        assert_eq!(session.suspend(t0 + Duration::seconds(4)), vec![flush("a.com", 4, 4)]);
        assert_eq!(session.state(), &SessionState::Idle);
        assert_eq!(session.active_tab(), None);
        assert!(session.suspend(t0 + Duration::seconds(8)).is_empty());
    }

    #[test]
    fn test_reset_discards_session() {
        let mut session = TrackingSession::new();
        session.navigate(1, Some(host("a.com")), at(4, 12, 0, 0));

        session.reset();

        assert_eq!(session.state(), &SessionState::Idle);
        assert_eq!(session.active_tab(), None);
    }
}
