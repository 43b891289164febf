use std::{env, io, path::PathBuf};

use anyhow::{anyhow, Result};

pub const APPLICATION_DIR_NAME: &str = "sitetime";

/// Directory holding time data, classifications, config and logs. Created when missing.
pub fn create_application_default_path() -> Result<PathBuf> {
    let mut path = platform_state_dir()?;
    path.push(APPLICATION_DIR_NAME);

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}

fn platform_state_dir() -> Result<PathBuf> {
    cfg_if::cfg_if! {
        if #[cfg(windows)] {
            env::var("APPDATA")
                .map(PathBuf::from)
                .map_err(|_| anyhow!("APPDATA should be present on Windows"))
        } else {
            env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".local/state")))
                .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))
        }
    }
}
