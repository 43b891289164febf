use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels `cancelation` on Ctrl-C or SIGTERM. Returns early if something else cancels it first.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt");
            cancelation.cancel();
        },
        _ = terminate() => {
            info!("Received termination signal");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!("Failed to listen for SIGTERM {e:?}");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}
