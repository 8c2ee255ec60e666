//! Development tab host: serves the tab list, accepts restart commands and
//! pushes `tab_status` events over a websocket.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::TabStatus,
    error::{ApiError, ErrorCode},
    protocol::{RawTabRecord, ServerEvent, TabStatusPayload},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings()?;
    let (events, _) = broadcast::channel(256);
    let state = AppState {
        tabs: settings.tabs,
        failing_restarts: settings.failing_restarts,
        restart_delay: Duration::from_millis(settings.restart_delay_ms),
        events,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "tab host listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/tabs", get(list_tabs))
        .route("/api/tabs/:index/restart", post(restart_tab))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_tabs(State(state): State<Arc<AppState>>) -> Json<Vec<RawTabRecord>> {
    Json(state.tabs.clone())
}

async fn restart_tab(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    let Some(tab) = state.tabs.get(index) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                ErrorCode::NotFound,
                format!("no tab at index {index}"),
            )),
        ));
    };
    if !tab.restartable.unwrap_or(false) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                ErrorCode::Validation,
                format!("tab '{}' is not restartable", tab.label),
            )),
        ));
    }
    if state.failing_restarts.contains(&index) {
        warn!(tab_index = index, "simulating restart failure");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(
                ErrorCode::Internal,
                format!("restart of '{}' failed", tab.label),
            )),
        ));
    }

    info!(tab_index = index, label = %tab.label, "restarting tab");
    publish_status(&state.events, index, TabStatus::Restarting, None);

    let events = state.events.clone();
    let delay = state.restart_delay;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        publish_status(&events, index, TabStatus::Running, None);
    });

    Ok(StatusCode::ACCEPTED)
}

fn publish_status(
    events: &broadcast::Sender<ServerEvent>,
    index: usize,
    state: TabStatus,
    message: Option<String>,
) {
    let event = ServerEvent::TabStatus(TabStatusPayload {
        tab_index: index as i64,
        state,
        message,
    });
    // No connected websocket is not an error.
    if events.send(event).is_err() {
        debug!(tab_index = index, %state, "no push subscribers for status event");
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();

    let send_task = tokio::spawn(async move {
        loop {
            let event = match events_rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "push subscriber lagged; dropping events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
