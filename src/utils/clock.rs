use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of wall-clock time and timers for the daemon. Wall-clock time decides which day and how
/// many seconds get recorded, instants drive the timers. Keeping both behind a trait lets tests
/// move the wall clock independently.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: Instant);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}
