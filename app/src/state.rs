use std::sync::Arc;

use engine::Engine;
use flume::Sender;
use record::Record;

use crate::registry::SubscriberRegistry;

/// Global process state (9. DESIGN NOTES): the registry, the ingest
/// channel, and the engine client, assembled once at startup and handed
/// to every connection task by shared reference.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn Engine>,
    pub ingest_tx: Sender<Record>,
    pub registry: Arc<SubscriberRegistry>,
}
