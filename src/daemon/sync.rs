//! Best-effort delivery of recorded seconds to a remote aggregation server. Nothing here is
//! allowed to slow down tracking: deltas are offered without waiting, grouped during a debounce
//! window, and dropped when delivery fails.

use std::{collections::BTreeMap, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::Instant,
};
use tracing::{debug, error, info, warn};
use url::Url;

use super::storage::{
    classifications::ClassificationStore,
    entities::{Category, WebsiteClassifications},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid sync endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server responded with {0}")]
    Status(reqwest::StatusCode),
}

/// Seconds that were successfully written to the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageDelta {
    pub date: NaiveDate,
    pub hostname: String,
    pub seconds: u64,
}

/// Body of `POST /track`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackEntry {
    pub date: NaiveDate,
    pub site: String,
    pub time: u64,
    pub category: Category,
}

/// Sending side of the sync queue.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    sender: mpsc::Sender<UsageDelta>,
}

impl SyncHandle {
    /// Queues a delta without waiting. When the queue is full the delta is lost for the remote
    /// side only.
    pub fn offer(&self, delta: UsageDelta) {
        match self.sender.try_send(delta) {
            Ok(()) => {}
            Err(TrySendError::Full(delta)) => warn!("Sync queue is full, dropping {delta:?}"),
            Err(TrySendError::Closed(delta)) => debug!("Sync stopped, dropping {delta:?}"),
        }
    }
}

pub fn sync_channel(capacity: usize) -> (SyncHandle, mpsc::Receiver<UsageDelta>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (SyncHandle { sender }, receiver)
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn push(&self, entry: &TrackEntry) -> Result<(), SyncError>;
}

/// Posts entries as json to `{endpoint}/track`.
pub struct HttpTransport {
    client: reqwest::Client,
    track_url: Url,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Result<Self, SyncError> {
        let mut base = Url::parse(endpoint)?;
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let track_url = base.join("track")?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SyncError::ClientBuild)?;

        Ok(Self { client, track_url })
    }

    pub fn track_url(&self) -> &Url {
        &self.track_url
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn push(&self, entry: &TrackEntry) -> Result<(), SyncError> {
        let response = self
            .client
            .post(self.track_url.clone())
            .json(entry)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status));
        }
        Ok(())
    }
}

/// Receives deltas from the tracker and delivers them in batches.
pub struct SyncModule<T> {
    receiver: mpsc::Receiver<UsageDelta>,
    transport: T,
    classifications: ClassificationStore,
    debounce: Duration,
}

impl<T: SyncTransport> SyncModule<T> {
    pub fn new(
        receiver: mpsc::Receiver<UsageDelta>,
        transport: T,
        classifications: ClassificationStore,
        debounce: Duration,
    ) -> Self {
        Self {
            receiver,
            transport,
            classifications,
            debounce,
        }
    }

    /// Runs until every [SyncHandle] is dropped. Whatever was queued by then is still delivered.
    pub async fn run(mut self) -> Result<()> {
        while let Some(first) = self.receiver.recv().await {
            let mut pending = BTreeMap::<(NaiveDate, String), u64>::new();
            *pending.entry((first.date, first.hostname)).or_default() += first.seconds;

            let deadline = Instant::now() + self.debounce;
            let mut closed = false;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => break,
                    delta = self.receiver.recv() => match delta {
                        Some(delta) => {
                            let key = (delta.date, delta.hostname);
                            *pending.entry(key).or_default() += delta.seconds;
                        }
                        None => {
                            closed = true;
                            break;
                        }
                    }
                }
            }

            self.deliver(pending).await;
            if closed {
                break;
            }
        }
        info!("Sync finished");
        Ok(())
    }

    async fn deliver(&self, pending: BTreeMap<(NaiveDate, String), u64>) {
        let classifications = self.classifications.load().await.unwrap_or_else(|e| {
            warn!("Failed to read classifications, syncing as unproductive: {e}");
            WebsiteClassifications::default()
        });

        for ((date, site), time) in pending {
            let entry = TrackEntry {
                date,
                category: classifications.category_of(&site),
                site,
                time,
            };
            match self.transport.push(&entry).await {
                Ok(()) => debug!("Synced {entry:?}"),
                Err(e) => error!("Failed to sync {entry:?}: {e}"),
            }
        }
    }
}
