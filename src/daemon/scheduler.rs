use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::utils::{clock::Clock, time::next_day_start};

use super::{
    storage::usage_store::UsageStore,
    tracking::{
        event::{BrowserEvent, TrackerEvent},
        Tracker,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How often the active session is flushed.
    pub tick_interval: Duration,
    /// How often the tracked day is compared with the current one.
    pub day_check_interval: Duration,
    /// Delay after local midnight for the midnight wake.
    pub midnight_offset: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            day_check_interval: Duration::from_secs(5 * 60),
            midnight_offset: Duration::from_secs(1),
        }
    }
}

enum Wake {
    Shutdown,
    InputClosed,
    Event(BrowserEvent),
    Midnight,
    DayCheck,
    Tick,
}

/// Owns the tracker and feeds it browser events and timer events one at a time. Because only this
/// loop touches the tracker, a flush always finishes before the next event is looked at.
pub struct Scheduler<S: UsageStore> {
    events: mpsc::Receiver<BrowserEvent>,
    tracker: Tracker<S>,
    shutdown: CancellationToken,
    clock: Box<dyn Clock>,
    config: SchedulerConfig,
}

impl<S: UsageStore> Scheduler<S> {
    pub fn new(
        events: mpsc::Receiver<BrowserEvent>,
        tracker: Tracker<S>,
        shutdown: CancellationToken,
        clock: Box<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            events,
            tracker,
            shutdown,
            clock,
            config,
        }
    }

    /// Executes the event loop. Stopping, either through shutdown or because the event source went
    /// away, flushes the active session.
    #[instrument(skip_all)]
    pub async fn run(mut self) -> Result<()> {
        let mut next_tick = self.clock.instant() + self.config.tick_interval;
        let mut next_day_check = self.clock.instant() + self.config.day_check_interval;
        let mut midnight = self.next_midnight();
        debug!("Next midnight wake in {:?}", midnight - self.clock.instant());

        loop {
            let wake = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => Wake::Shutdown,
                event = self.events.recv() => match event {
                    Some(event) => Wake::Event(event),
                    None => Wake::InputClosed,
                },
                _ = self.clock.sleep_until(midnight) => Wake::Midnight,
                _ = self.clock.sleep_until(next_day_check) => Wake::DayCheck,
                _ = self.clock.sleep_until(next_tick) => Wake::Tick,
            };

            let event = match wake {
                Wake::Shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                Wake::InputClosed => {
                    info!("Event source closed");
                    break;
                }
                Wake::Event(event) => TrackerEvent::Browser(event),
                Wake::Midnight => {
                    midnight = self.next_midnight();
                    TrackerEvent::MidnightWake
                }
                Wake::DayCheck => {
                    next_day_check = advance(
                        next_day_check,
                        self.config.day_check_interval,
                        self.clock.instant(),
                    );
                    TrackerEvent::DayCheck
                }
                Wake::Tick => {
                    next_tick =
                        advance(next_tick, self.config.tick_interval, self.clock.instant());
                    TrackerEvent::Tick
                }
            };

            self.tracker.handle(event, self.clock.time()).await;
        }

        self.tracker
            .handle(TrackerEvent::Shutdown, self.clock.time())
            .await;
        Ok(())
    }

    fn next_midnight(&self) -> Instant {
        self.clock.instant() + until_next_midnight(self.clock.time(), self.config.midnight_offset)
    }
}

/// Next deadline of a periodic timer. Missed deadlines are skipped instead of fired in a burst.
fn advance(deadline: Instant, interval: Duration, now: Instant) -> Instant {
    let next = deadline + interval;
    if next <= now {
        now + interval
    } else {
        next
    }
}

/// Time left until the next local midnight plus `offset`.
pub fn until_next_midnight(now: DateTime<Utc>, offset: Duration) -> Duration {
    (next_day_start(now) - now).to_std().unwrap_or_default() + offset
}
