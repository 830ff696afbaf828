use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use record::{Level, Record};
use tokio::sync::{Mutex, Notify};

const BUFFER_CAPACITY: usize = 256;
const DROP_THRESHOLD: u64 = 1024;

/// Conjunction of optional equality/membership constraints (4.D, GLOSSARY
/// "Filter predicate"). Deliberately a plain struct rather than a
/// dynamic-dispatch predicate table — this is the hot path for every
/// ingested record (9. DESIGN NOTES).
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub projects: Option<HashSet<String>>,
    pub levels: Option<HashSet<Level>>,
    pub trace_id: Option<String>,
    pub environment: Option<String>,
}

impl Filter {
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(projects) = &self.projects {
            if !projects.contains(&record.project) {
                return false;
            }
        }
        if let Some(levels) = &self.levels {
            if !levels.contains(&record.level) {
                return false;
            }
        }
        if let Some(trace_id) = &self.trace_id {
            match &record.trace_id {
                Some(rt) if rt == trace_id => {}
                _ => return false,
            }
        }
        if let Some(environment) = &self.environment {
            if &record.environment != environment {
                return false;
            }
        }
        true
    }
}

/// A live subscriber's delivery state. The socket task that created it
/// holds only the id plus this `Arc`; the registry is the single owner
/// of the table, so deregistration by id never needs the socket to
/// reach back into the registry's internals (9. DESIGN NOTES).
pub struct Subscriber {
    pub filter: Filter,
    buffer: Mutex<VecDeque<Arc<Record>>>,
    notify: Notify,
    pub dropped: AtomicU64,
    closed: AtomicBool,
    close_notify: Notify,
}

impl Subscriber {
    fn new(filter: Filter) -> Self {
        Subscriber {
            filter,
            buffer: Mutex::new(VecDeque::with_capacity(BUFFER_CAPACITY)),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
        }
    }

    async fn push(&self, record: Arc<Record>) {
        let mut buffer = self.buffer.lock().await;
        if buffer.len() >= BUFFER_CAPACITY {
            buffer.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        buffer.push_back(record);
        self.notify.notify_one();
    }

    /// Forces the subscriber closed (4.D: past `DROP_THRESHOLD`). Wakes
    /// a `recv` that's already waiting, and leaves a permit for one that
    /// hasn't started waiting yet, so the socket task never misses it.
    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.close_notify.notify_one();
    }

    /// Waits for and drains one record, used by the per-subscriber
    /// writer task. Returns `None` once the subscriber has been closed
    /// and nothing is left buffered.
    pub async fn recv(&self) -> Option<Arc<Record>> {
        loop {
            if let Some(record) = self.buffer.lock().await.pop_front() {
                return Some(record);
            }
            if self.closed.load(Ordering::Relaxed) {
                return None;
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = self.close_notify.notified() => {}
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    pub fn is_overflowing(&self) -> bool {
        self.dropped.load(Ordering::Relaxed) > DROP_THRESHOLD
    }
}

/// Process-wide mapping from subscriber id to subscriber (4.D). Sharded
/// so a `publish` matching against many subscribers does not serialize
/// behind one global lock (5. CONCURRENCY & RESOURCE MODEL).
pub struct SubscriberRegistry {
    subscribers: DashMap<u64, Arc<Subscriber>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        SubscriberRegistry {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn register(&self, filter: Filter) -> (u64, Arc<Subscriber>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber::new(filter));
        self.subscribers.insert(id, subscriber.clone());
        (id, subscriber)
    }

    pub fn deregister(&self, id: u64) {
        self.subscribers.remove(&id);
    }

    /// Non-blocking: enqueues onto every matching subscriber's bounded
    /// buffer. Never touches persistence and never errors — a slow or
    /// dead subscriber only affects its own buffer (7. ERROR HANDLING
    /// DESIGN propagation policy).
    pub async fn publish(&self, record: Arc<Record>) {
        let mut overflowing = Vec::new();
        for entry in self.subscribers.iter() {
            let (id, subscriber) = (*entry.key(), entry.value().clone());
            if subscriber.filter.matches(&record) {
                subscriber.push(record.clone()).await;
                if subscriber.is_overflowing() {
                    overflowing.push(id);
                }
            }
        }
        for id in overflowing {
            if let Some((_, subscriber)) = self.subscribers.remove(&id) {
                subscriber.close();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
