use std::collections::HashSet;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use record::Level;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::ingest::ingest;
use crate::registry::Filter;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub mode: Option<String>,
    pub projects: Option<String>,
    pub levels: Option<String>,
    #[serde(rename = "traceId")]
    pub trace_id: Option<String>,
    pub environment: Option<String>,
}

fn csv_set(raw: &Option<String>) -> Option<HashSet<String>> {
    raw.as_ref().map(|v| v.split(',').map(str::to_string).collect())
}

fn csv_levels(raw: &Option<String>) -> Option<HashSet<Level>> {
    raw.as_ref().map(|v| v.split(',').filter_map(Level::parse).collect())
}

impl From<&WsParams> for Filter {
    fn from(params: &WsParams) -> Self {
        Filter {
            projects: csv_set(&params.projects),
            levels: csv_levels(&params.levels),
            trace_id: params.trace_id.clone(),
            environment: params.environment.clone(),
        }
    }
}

/// `GET /ws` — default mode ingests; `mode=subscribe` enters broadcast
/// mode with the remaining query string parsed as a filter (4.F).
pub async fn upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    if params.mode.as_deref() == Some("subscribe") {
        let filter = Filter::from(&params);
        ws.on_upgrade(move |socket| handle_subscribe(socket, state, filter))
    } else {
        ws.on_upgrade(move |socket| handle_ingest(socket, state))
    }
}

/// Each inbound text frame is a record or an array of records, same
/// normalization as `/ingest`. An invalid frame is logged but the
/// session stays open (4.E, 4.F).
async fn handle_ingest(mut socket: WebSocket, state: AppState) {
    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                Ok(payload) => {
                    ingest(&state, &payload).await;
                }
                Err(err) => {
                    debug!("discarding unparseable ws ingest frame: {err}");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!("ws ingest session error: {err}");
                break;
            }
        }
    }
}

/// A subscribe session never reads records from the client — it only
/// drains its buffer and pushes frames, answering pings through axum's
/// default ping/pong handling (4.F).
async fn handle_subscribe(mut socket: WebSocket, state: AppState, filter: Filter) {
    let (id, subscriber) = state.registry.register(filter);

    loop {
        tokio::select! {
            biased;

            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        warn!("ws subscribe session error: {err}");
                        break;
                    }
                }
            }

            record = subscriber.recv() => {
                let record = match record {
                    Some(record) => record,
                    None => {
                        debug!("subscriber {id} force-closed: too many dropped records");
                        break;
                    }
                };
                let frame = match serde_json::to_string(&*record) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!("failed to encode record for subscriber {id}: {err}");
                        continue;
                    }
                };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.registry.deregister(id);
}
