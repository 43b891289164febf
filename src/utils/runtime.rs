use anyhow::Result;

/// Both binaries run everything on one thread. The daemon relies on all events being dispatched
/// in order, see
/// [Scheduler](crate::daemon::scheduler::Scheduler).
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
