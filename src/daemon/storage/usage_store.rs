use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use fs4::tokio::AsyncFileExt;
use serde::Serialize;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, instrument};

use super::{
    entities::{DailyUsage, TimeDataDocument},
    StoreError,
};

/// Interface for abstracting the durable per-day counters.
pub trait UsageStore {
    /// Reads every counter. A store that was never written to is empty.
    fn load(&self) -> impl Future<Output = Result<DailyUsage, StoreError>>;

    /// Replaces stored counters with `usage`.
    fn save(&self, usage: &DailyUsage) -> impl Future<Output = Result<(), StoreError>>;
}

impl<T: Deref> UsageStore for T
where
    T::Target: UsageStore,
{
    fn load(&self) -> impl Future<Output = Result<DailyUsage, StoreError>> {
        self.deref().load()
    }

    fn save(&self, usage: &DailyUsage) -> impl Future<Output = Result<(), StoreError>> {
        self.deref().save(usage)
    }
}

pub const TIME_DATA_FILE: &str = "time_data.json";
const LOCK_FILE: &str = "time_data.lock";
const TEMP_FILE: &str = "time_data.json.tmp";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimeDataDocumentRef<'a> {
    time_data: &'a DailyUsage,
}

/// The main realization of [UsageStore]. Keeps `{"timeData": {...}}` in a single file.
///
/// Both the daemon and the cli can touch the file, so access goes through a lock file. Writes go
/// into a temporary file that is then renamed over the document.
pub struct JsonUsageStore {
    dir: PathBuf,
}

impl JsonUsageStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TIME_DATA_FILE)
    }

    async fn open_lock(&self) -> Result<File, StoreError> {
        File::options()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))
            .await
            .map_err(StoreError::Lock)
    }

    async fn read_document(path: &Path) -> Result<DailyUsage, StoreError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No time data at {path:?} yet");
                return Ok(DailyUsage::default());
            }
            Err(e) => return Err(StoreError::Read(e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(DailyUsage::default());
        }
        let document: TimeDataDocument =
            serde_json::from_slice(&bytes).map_err(StoreError::Corrupt)?;
        Ok(document.time_data)
    }

    async fn write_document(&self, usage: &DailyUsage) -> Result<(), StoreError> {
        let buffer = serde_json::to_vec(&TimeDataDocumentRef { time_data: usage })
            .map_err(StoreError::Encode)?;

        let temp_path = self.dir.join(TEMP_FILE);
        let mut temp = File::create(&temp_path).await.map_err(StoreError::Write)?;
        temp.write_all(&buffer).await.map_err(StoreError::Write)?;
        temp.sync_all().await.map_err(StoreError::Write)?;
        drop(temp);

        tokio::fs::rename(&temp_path, self.path())
            .await
            .map_err(StoreError::Write)
    }
}

impl UsageStore for JsonUsageStore {
    #[instrument(skip(self))]
    async fn load(&self) -> Result<DailyUsage, StoreError> {
        let lock = self.open_lock().await?;
        lock.lock_shared().map_err(StoreError::Lock)?;
        let result = Self::read_document(&self.path()).await;
        lock.unlock_async().await.map_err(StoreError::Lock)?;
        result
    }

    #[instrument(skip_all)]
    async fn save(&self, usage: &DailyUsage) -> Result<(), StoreError> {
        let lock = self.open_lock().await?;
        lock.lock_exclusive().map_err(StoreError::Lock)?;
        let result = self.write_document(usage).await;
        lock.unlock_async().await.map_err(StoreError::Lock)?;
        result
    }
}
