pub mod config;
pub mod http;
pub mod ingest;
pub mod registry;
pub mod shape;
pub mod state;
pub mod writer;

use std::sync::Arc;

use anyhow::{bail, Context};
use engine::{Engine, EngineError, IndexSchema, SearchEngine, SearchQuery};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use config::{EngineArgs, ServeArgs};
use registry::SubscriberRegistry;
use state::AppState;
use writer::BatchWriter;

const INGEST_CHANNEL_CAPACITY: usize = 4096;

pub fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

fn build_engine(args: &EngineArgs) -> Arc<dyn Engine> {
    Arc::new(SearchEngine::new(args.meili_host.clone(), args.meili_key.clone()))
}

/// One-shot administrative action: creates/configures the index and
/// exits (4.H). A failure here is an unrecoverable engine error.
pub async fn run_init(args: EngineArgs) -> anyhow::Result<()> {
    let engine = build_engine(&args);
    match engine.ensure_index(IndexSchema::default()).await {
        Ok(()) => {
            info!("index ready at {}", args.meili_host);
            Ok(())
        }
        Err(err) => {
            error!("failed to configure index: {err}");
            std::process::exit(2);
        }
    }
}

/// Checks that the index looks configured without creating it. `serve`
/// never calls `ensure_index` itself (4.H): an absent/misconfigured
/// index is a startup error, but an unreachable engine is tolerated —
/// ingest keeps retrying through the batch writer.
async fn check_index(engine: &dyn Engine) -> anyhow::Result<()> {
    match engine
        .search(SearchQuery {
            limit: 0,
            ..Default::default()
        })
        .await
    {
        Ok(_) => Ok(()),
        Err(EngineError::Permanent(reason)) => {
            bail!("engine index is absent or misconfigured: {reason}");
        }
        Err(EngineError::Transient(reason)) => {
            warn!("engine unreachable at startup, will retry on ingest: {reason}");
            Ok(())
        }
    }
}

/// Runs the HTTP/WS server until a shutdown signal arrives (4.F, 4.J).
pub async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let engine = build_engine(&args.engine);

    if let Err(err) = check_index(engine.as_ref()).await {
        error!("{err:#}");
        std::process::exit(1);
    }

    let (ingest_tx, ingest_rx) = flume::bounded(INGEST_CHANNEL_CAPACITY);
    util::watch_depth(ingest_tx.clone(), "ingest");

    let registry = Arc::new(SubscriberRegistry::new());
    let state = AppState {
        engine: engine.clone(),
        ingest_tx,
        registry,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let writer = BatchWriter::new(ingest_rx, engine);
    let writer_handle = tokio::spawn(writer.run(shutdown_rx));

    let app = http::router(state);
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    if let Err(err) = writer_handle.await {
        error!("batch writer task panicked: {err}");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, draining");
}
