use std::sync::Arc;
use std::time::Duration;

use engine::Engine;
use flume::Receiver;
use record::Record;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{error, warn};
use util::backoff;

const BATCH_SIZE: usize = 200;
const BATCH_AGE: Duration = Duration::from_millis(250);
const MAX_ATTEMPTS: u32 = 5;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Single long-running task that coalesces normalized records into
/// size/time-bounded batches and flushes them to the engine (4.C Batch
/// writer).
pub struct BatchWriter {
    rx: Receiver<Record>,
    engine: Arc<dyn Engine>,
    flush_lock: Arc<Mutex<()>>,
}

impl BatchWriter {
    pub fn new(rx: Receiver<Record>, engine: Arc<dyn Engine>) -> Self {
        BatchWriter {
            rx,
            engine,
            flush_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut pending: Vec<Record> = Vec::new();
        let mut oldest: Option<Instant> = None;

        loop {
            let sleep_for = match oldest {
                Some(started) => BATCH_AGE.saturating_sub(started.elapsed()),
                None => Duration::from_secs(3600),
            };

            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }

                maybe_record = self.rx.recv_async() => {
                    match maybe_record {
                        Ok(record) => {
                            if oldest.is_none() {
                                oldest = Some(Instant::now());
                            }
                            pending.push(record);
                            if pending.len() >= BATCH_SIZE {
                                let batch = std::mem::take(&mut pending);
                                oldest = None;
                                self.spawn_flush(batch);
                            }
                        }
                        Err(_) => break,
                    }
                }

                _ = tokio::time::sleep(sleep_for), if oldest.is_some() => {
                    let batch = std::mem::take(&mut pending);
                    oldest = None;
                    self.spawn_flush(batch);
                }
            }
        }

        self.drain_and_flush(pending).await;
    }

    async fn drain_and_flush(&self, mut pending: Vec<Record>) {
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while Instant::now() < deadline {
            match tokio::time::timeout_at(deadline, self.rx.recv_async()).await {
                Ok(Ok(record)) => pending.push(record),
                _ => break,
            }
        }
        if !pending.is_empty() {
            Self::flush_with_retry(self.engine.clone(), pending).await;
        }
    }

    fn spawn_flush(&self, batch: Vec<Record>) {
        if batch.is_empty() {
            return;
        }
        let engine = self.engine.clone();
        let flush_lock = self.flush_lock.clone();
        tokio::spawn(async move {
            // At most one in-flight flush (4.C); a second trigger while one
            // is running waits here rather than racing the engine.
            let _guard = flush_lock.lock().await;
            Self::flush_with_retry(engine, batch).await;
        });
    }

    async fn flush_with_retry(engine: Arc<dyn Engine>, batch: Vec<Record>) {
        let size = batch.len();
        let mut attempt = 0;
        loop {
            match engine.upsert_documents(&batch).await {
                Ok(()) => return,
                Err(engine::EngineError::Permanent(reason)) => {
                    error!("dropping batch of {size}: permanent engine error: {reason}");
                    return;
                }
                Err(engine::EngineError::Transient(reason)) => {
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        error!(
                            "dropping batch of {size} after {attempt} attempts: {reason}"
                        );
                        return;
                    }
                    let wait = backoff::delay(attempt);
                    warn!(
                        "transient engine error, retrying batch of {size} in {:?} (attempt {attempt}): {reason}",
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use engine::{EngineError, IndexSchema, SearchQuery, SearchResponse};
    use record::normalize;
    use serde_json::json;

    use super::*;

    struct CountingEngine {
        calls: AtomicUsize,
        flushed: Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl Engine for CountingEngine {
        async fn ensure_index(&self, _schema: IndexSchema) -> Result<(), EngineError> {
            Ok(())
        }

        async fn upsert_documents(&self, batch: &[Record]) -> Result<(), EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.flushed.lock().unwrap().push(batch.len());
            Ok(())
        }

        async fn search(&self, _query: SearchQuery) -> Result<SearchResponse, EngineError> {
            unimplemented!("not exercised by writer tests")
        }

        async fn delete_by_filter(&self, _filter: &str) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn record() -> Record {
        normalize(&json!({"project": "p", "level": "info", "message": "m"})).unwrap()
    }

    #[tokio::test]
    async fn flushes_on_time_trigger_with_zero_further_arrivals() {
        let (tx, rx) = flume::unbounded();
        let engine = Arc::new(CountingEngine {
            calls: AtomicUsize::new(0),
            flushed: Mutex::new(Vec::new()),
        });
        let writer = BatchWriter::new(rx, engine.clone());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.send_async(record()).await.unwrap();
        let handle = tokio::spawn(writer.run(shutdown_rx));

        tokio::time::sleep(BATCH_AGE + Duration::from_millis(100)).await;
        drop(tx);
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        assert_eq!(engine.flushed.lock().unwrap().as_slice(), &[1]);
    }

    #[tokio::test]
    async fn flushes_on_size_trigger() {
        let (tx, rx) = flume::unbounded();
        let engine = Arc::new(CountingEngine {
            calls: AtomicUsize::new(0),
            flushed: Mutex::new(Vec::new()),
        });
        let writer = BatchWriter::new(rx, engine.clone());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        for _ in 0..BATCH_SIZE {
            tx.send_async(record()).await.unwrap();
        }
        let handle = tokio::spawn(writer.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(tx);
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        let flushed = engine.flushed.lock().unwrap();
        assert_eq!(flushed.iter().sum::<usize>(), BATCH_SIZE);
    }

    #[tokio::test]
    async fn drops_batch_after_exhausting_retries_on_permanent_error() {
        struct FailingEngine;

        #[async_trait::async_trait]
        impl Engine for FailingEngine {
            async fn ensure_index(&self, _schema: IndexSchema) -> Result<(), EngineError> {
                Ok(())
            }
            async fn upsert_documents(&self, _batch: &[Record]) -> Result<(), EngineError> {
                Err(EngineError::Permanent("bad filterable attribute".into()))
            }
            async fn search(&self, _query: SearchQuery) -> Result<SearchResponse, EngineError> {
                unimplemented!()
            }
            async fn delete_by_filter(&self, _filter: &str) -> Result<(), EngineError> {
                Ok(())
            }
        }

        // A permanent error must not retry; this completes quickly or the
        // test times out.
        BatchWriter::flush_with_retry(Arc::new(FailingEngine), vec![record()]).await;
    }
}
