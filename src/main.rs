use std::time::Duration;

use anyhow::Result;
use sitetime::{cli::run_cli, utils::runtime::single_thread_runtime};
use tracing::error;

fn main() -> Result<()> {
    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(run_cli()).inspect_err(|e| {
        error!("Error running cli {e:?}");
    });
    // `serve` may leave a blocking stdin read behind.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}
