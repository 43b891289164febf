use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use collection::event_source::{EventSource, Framing};
use scheduler::{Scheduler, SchedulerConfig};
use storage::{
    classifications::ClassificationStore,
    usage_store::{JsonUsageStore, UsageStore},
};
use sync::{sync_channel, HttpTransport, SyncHandle, SyncModule};
use tokio::{fs::File, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracking::{accumulator::Accumulator, event::BrowserEvent, Tracker};

use crate::{
    config::Config,
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod collection;
pub mod scheduler;
pub mod shutdown;
pub mod storage;
pub mod sync;
pub mod tracking;

/// Where browser events come from.
#[derive(Debug, Clone)]
pub struct EventInput {
    /// Stdin when empty.
    pub path: Option<PathBuf>,
    pub framing: Framing,
}

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf, config: Config, input: EventInput) -> Result<()> {
    info!("Starting daemon in {dir:?}");
    let (sender, receiver) = mpsc::channel::<BrowserEvent>(config.event_channel_capacity);
    let shutdown_token = CancellationToken::new();

    let (sync_handle, sync_module) = match create_sync(&config, &dir)? {
        Some((handle, module)) => (Some(handle), Some(module)),
        None => (None, None),
    };

    let store = JsonUsageStore::new(dir)?;
    let scheduler = create_scheduler(
        receiver,
        store,
        sync_handle,
        &shutdown_token,
        config.scheduler(),
        DefaultClock,
    );

    let (_, input_result, scheduler_result, sync_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        read_events(input, sender, shutdown_token.clone()),
        async {
            let result = scheduler.run().await;
            // Nothing is tracked anymore, so everything else should stop as well.
            shutdown_token.cancel();
            result
        },
        async {
            match sync_module {
                Some(module) => module.run().await,
                None => Ok(()),
            }
        },
    );

    if let Err(input_result) = input_result {
        error!("Event source got an error {:?}", input_result);
    }

    if let Err(scheduler_result) = scheduler_result {
        error!("Scheduler got an error {:?}", scheduler_result);
    }

    if let Err(sync_result) = sync_result {
        error!("Sync got an error {:?}", sync_result);
    }

    info!("Daemon stopped");
    Ok(())
}

fn create_scheduler<S: UsageStore>(
    receiver: mpsc::Receiver<BrowserEvent>,
    store: S,
    sync: Option<SyncHandle>,
    shutdown_token: &CancellationToken,
    config: SchedulerConfig,
    clock: impl Clock,
) -> Scheduler<S> {
    let tracker = Tracker::new(Accumulator::new(store, sync));
    Scheduler::new(
        receiver,
        tracker,
        shutdown_token.clone(),
        Box::new(clock),
        config,
    )
}

fn create_sync(
    config: &Config,
    dir: &std::path::Path,
) -> Result<Option<(SyncHandle, SyncModule<HttpTransport>)>> {
    let Some(sync) = &config.sync else {
        debug!("Remote sync is not configured");
        return Ok(None);
    };

    let transport = HttpTransport::new(&sync.endpoint)?;
    info!("Syncing to {}", transport.track_url());
    let (handle, receiver) = sync_channel(sync.queue_capacity);
    let module = SyncModule::new(
        receiver,
        transport,
        ClassificationStore::in_dir(dir),
        Duration::from_millis(sync.debounce_ms),
    );
    Ok(Some((handle, module)))
}

/// Pumps events from stdin or from `input.path`. A fifo is reopened whenever its writer goes away,
/// any other file is read once.
async fn read_events(
    input: EventInput,
    sender: mpsc::Sender<BrowserEvent>,
    shutdown: CancellationToken,
) -> Result<()> {
    let Some(path) = input.path else {
        return EventSource::new(tokio::io::stdin(), input.framing, sender, shutdown)
            .run()
            .await;
    };

    loop {
        let file = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            file = File::open(&path) => file?,
        };
        let reopen = is_fifo(&file).await;

        EventSource::new(file, input.framing, sender.clone(), shutdown.clone())
            .run()
            .await?;

        if !reopen || shutdown.is_cancelled() || sender.is_closed() {
            return Ok(());
        }
        debug!("Writer of {path:?} went away, reopening");
    }
}

async fn is_fifo(file: &File) -> bool {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            use std::os::unix::fs::FileTypeExt;
            file.metadata()
                .await
                .map(|v| v.file_type().is_fifo())
                .unwrap_or(false)
        } else {
            let _ = file;
            false
        }
    }
}

#[cfg(test)]
mod daemon_tests {
    use std::{
        sync::atomic::{AtomicI64, Ordering},
        time::Duration,
    };

    use anyhow::Result;
    use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::{sync::mpsc, time::Instant};
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            collection::event_source::Framing,
            create_scheduler, read_events,
            scheduler::SchedulerConfig,
            storage::usage_store::{JsonUsageStore, UsageStore},
            EventInput,
        },
        utils::{clock::Clock, logging::TEST_LOGGING},
    };

    /// Wall clock that moves 10 seconds forward every time it is read.
    struct SteppingClock {
        start_time: DateTime<Utc>,
        reads: AtomicI64,
    }

    #[async_trait::async_trait]
    impl Clock for SteppingClock {
        fn time(&self) -> DateTime<Utc> {
            let reads = self.reads.fetch_add(1, Ordering::SeqCst);
            self.start_time + chrono::Duration::seconds(10 * reads)
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep_until(&self, instant: Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    /// Runs events from a file through the whole pipeline into the json store.
    #[tokio::test]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let events_path = dir.path().join("events.jsonl");
        std::fs::write(
            &events_path,
            concat!(
                r#"{"type":"startup","tabId":1,"url":"https://a.com/"}"#,
                "\n",
                r#"{"type":"tabActivated","tabId":2,"url":"about:blank"}"#,
                "\n",
            ),
        )?;

        let (sender, receiver) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let scheduler = create_scheduler(
            receiver,
            JsonUsageStore::new(dir.path().join("data"))?,
            None,
            &shutdown,
            SchedulerConfig {
                tick_interval: Duration::from_secs(3600),
                ..SchedulerConfig::default()
            },
            SteppingClock {
                start_time: Local
                    .with_ymd_and_hms(2018, 7, 4, 12, 0, 0)
                    .unwrap()
                    .with_timezone(&Utc),
                reads: AtomicI64::new(0),
            },
        );

        let (input_result, scheduler_result) = tokio::join!(
            read_events(
                EventInput {
                    path: Some(events_path),
                    framing: Framing::Lines,
                },
                sender,
                shutdown.clone(),
            ),
            scheduler.run(),
        );
        input_result?;
        scheduler_result?;

        let usage = JsonUsageStore::new(dir.path().join("data"))?.load().await?;
        let day = NaiveDate::from_ymd_opt(2018, 7, 4).unwrap();
        assert_eq!(usage.seconds(day, "a.com"), 10);
        assert_eq!(usage.total_seconds(), 10);
        Ok(())
    }
}
