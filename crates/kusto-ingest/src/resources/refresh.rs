use super::ResourceManager;
use crate::{ClientOptions, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Copy, Clone)]
struct Cadence {
    success: Duration,
    failure: Duration,
}

/// Spawn the two periodic refresh tasks: ingestion resources and the
/// identity token. Each runs immediately, then reschedules itself at the
/// success cadence, falling back to the failure cadence when a refresh
/// errors out. Overlap of the same task is impossible: the next run is
/// reached only after the previous one completes.
pub(super) fn spawn(manager: &Arc<ResourceManager>, options: &ClientOptions) {
    let cadence = Cadence {
        success: options.refresh_interval,
        failure: options.failure_refresh_interval,
    };

    tokio::spawn(run(
        manager.clone(),
        cadence,
        "ingestion_resources",
        |manager| async move { manager.refresh_ingestion_resources().await },
    ));
    tokio::spawn(run(
        manager.clone(),
        cadence,
        "identity_token",
        |manager| async move { manager.refresh_identity_token().await },
    ));
}

async fn run<F, Fut>(manager: Arc<ResourceManager>, cadence: Cadence, task: &'static str, refresh: F)
where
    F: Fn(Arc<ResourceManager>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    loop {
        let interval = match refresh(manager.clone()).await {
            Ok(()) => cadence.success,
            Err(err) => {
                tracing::warn!(task, error = ?err, "periodic refresh failed");
                cadence.failure
            }
        };

        // close() cancels the sleep, not the refresh above it: an in-flight
        // refresh finishes and publishes atomically, but no further run is
        // scheduled.
        tokio::select! {
            _ = manager.shutdown.cancelled() => return,
            _ = tokio::time::sleep(interval) => (),
        }
    }
}
