use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use flume::Sender;
use num_format::{CustomFormat, ToFormattedString};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{error, info};

const WARNING: usize = 2_000;

/// Spawns a background task that watches a channel's backlog and logs
/// once it crosses `WARNING`, then again once it drops back below it.
/// Grounded in the ingest channel being the system's only back-pressure
/// mechanism toward emitters (4.E, 5. CONCURRENCY & RESOURCE MODEL):
/// operators need to see it filling up before producers start blocking.
pub fn watch_depth<S: AsRef<str>, P: Send + 'static>(tx: Sender<P>, name: S) {
    let name = name.as_ref().to_string();

    tokio::spawn(async move {
        let last_log = RwLock::new(Instant::now());
        let overwhelmed = AtomicBool::new(false);
        let format = CustomFormat::builder().separator("'").build().unwrap();
        let mut interval = tokio::time::interval(Duration::from_secs(1));

        loop {
            interval.tick().await;
            let len = tx.len();

            if len > WARNING {
                let do_log = last_log.read().await.elapsed() > Duration::from_secs(10);
                if do_log {
                    error!(
                        "channel {} backlog too big: {}",
                        name,
                        len.to_formatted_string(&format)
                    );
                    *last_log.write().await = Instant::now();
                    overwhelmed.store(true, Ordering::Relaxed);
                }
            } else if overwhelmed.load(Ordering::Relaxed) {
                info!(
                    "channel {} relaxed: {}",
                    name,
                    len.to_formatted_string(&format)
                );
                overwhelmed.store(false, Ordering::Relaxed);
            }
        }
    });
}
