//! Decides which website the time goes to.
//!
//! [session::TrackingSession] is a pure state machine that turns events into flushes,
//! [accumulator::Accumulator] writes those flushes into the store. [Tracker] glues both together
//! and absorbs store failures, so tracking keeps running with a lossy store.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use accumulator::Accumulator;
use event::{BrowserEvent, TrackerEvent};
use hostname::resolve_hostname;
use session::{Flush, TabId, TrackingSession};

use super::storage::usage_store::UsageStore;

pub mod accumulator;
pub mod event;
pub mod hostname;
pub mod session;

pub struct Tracker<S: UsageStore> {
    session: TrackingSession,
    accumulator: Accumulator<S>,
}

impl<S: UsageStore> Tracker<S> {
    pub fn new(accumulator: Accumulator<S>) -> Self {
        Self {
            session: TrackingSession::new(),
            accumulator,
        }
    }

    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    /// Applies a single event. Never fails: write errors are logged and the seconds are lost.
    pub async fn handle(&mut self, event: TrackerEvent, now: DateTime<Utc>) {
        let flushes = match event {
            TrackerEvent::Browser(BrowserEvent::TabActivated { tab_id, url }) => {
                self.navigate(tab_id, url.as_deref(), now)
            }
            TrackerEvent::Browser(BrowserEvent::TabUpdated { tab_id, url }) => {
                match url {
                    Some(url) if self.session.active_tab() == Some(tab_id) => {
                        self.navigate(tab_id, Some(&url), now)
                    }
                    _ => {
                        debug!("Ignoring update of inactive tab {tab_id}");
                        vec![]
                    }
                }
            }
            TrackerEvent::Browser(BrowserEvent::Startup { tab_id, url }) => {
                info!("Browser started");
                self.session.reset();
                match tab_id {
                    Some(tab_id) => self.navigate(tab_id, url.as_deref(), now),
                    None => vec![],
                }
            }
            TrackerEvent::Browser(BrowserEvent::Suspend) | TrackerEvent::Shutdown => {
                info!("Tracking stopped");
                self.session.suspend(now)
            }
            TrackerEvent::Tick => self.session.tick(now),
            TrackerEvent::DayCheck | TrackerEvent::MidnightWake => self.session.roll_over(now),
        };

        for flush in flushes {
            self.record(&flush).await;
        }
    }

    fn navigate(&mut self, tab_id: TabId, url: Option<&str>, now: DateTime<Utc>) -> Vec<Flush> {
        let hostname = resolve_hostname(url);
        match self.session.navigate(tab_id, hostname, now) {
            Some(flushes) => {
                match self.session.hostname() {
                    Some(hostname) => info!("Tracking {hostname} in tab {tab_id}"),
                    None => info!("Tab {tab_id} is not trackable"),
                }
                flushes
            }
            None => {
                debug!("Tab {tab_id} still shows the same site");
                vec![]
            }
        }
    }

    async fn record(&self, flush: &Flush) {
        if let Err(e) = self.accumulator.flush(flush).await {
            error!(
                "Failed to record {}s on {} for {}: {e}",
                flush.seconds, flush.hostname, flush.day
            );
        }
    }
}
