use std::{io::ErrorKind, path::PathBuf};

use tracing::debug;

use super::{
    entities::{ClassificationsDocument, WebsiteClassifications},
    StoreError,
};

pub const CLASSIFICATIONS_FILE: &str = "classifications.json";

/// Read-only access to `{"websiteClassifications": {...}}`. The lists are edited by other tools,
/// so they are re-read whenever they are needed.
#[derive(Debug, Clone)]
pub struct ClassificationStore {
    path: PathBuf,
}

impl ClassificationStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(dir: &std::path::Path) -> Self {
        Self::new(dir.join(CLASSIFICATIONS_FILE))
    }

    pub async fn load(&self) -> Result<WebsiteClassifications, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice::<ClassificationsDocument>(&bytes)
                .map(|v| v.website_classifications)
                .map_err(StoreError::Corrupt),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No classifications at {:?}", self.path);
                Ok(WebsiteClassifications::default())
            }
            Err(e) => Err(StoreError::Read(e)),
        }
    }
}
