//! Push-event channel capability and its in-process and websocket backings.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use futures::StreamExt;
use serde_json::Value;
use shared::protocol::PushEnvelope;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

pub type PushListener = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Subscribe/unsubscribe surface of a push-event channel.
///
/// Listeners are registered for one event category and receive that
/// category's raw payloads in delivery order.
pub trait PushChannel: Send + Sync {
    fn subscribe(&self, category: &str, listener: PushListener) -> ListenerId;
    /// Returns `false` when the listener was already removed.
    fn unsubscribe(&self, id: ListenerId) -> bool;
}

struct RegisteredListener {
    id: ListenerId,
    category: String,
    listener: PushListener,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    listeners: Vec<RegisteredListener>,
}

/// In-process fan-out of push payloads to registered listeners.
#[derive(Default)]
pub struct EventHub {
    state: Mutex<HubState>,
}

impl EventHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    /// Delivers one payload to every listener of `category`, in registration
    /// order. Returns the number of listeners invoked.
    pub fn deliver(&self, category: &str, payload: &Value) -> usize {
        // Listeners run outside the lock so they may unsubscribe themselves.
        let targets: Vec<PushListener> = self
            .state()
            .listeners
            .iter()
            .filter(|registered| registered.category == category)
            .map(|registered| Arc::clone(&registered.listener))
            .collect();
        for listener in &targets {
            listener(payload);
        }
        targets.len()
    }

    /// Parses a text frame as a push envelope and delivers it. Frames that
    /// are not envelopes are ignored.
    pub fn deliver_frame(&self, text: &str) -> bool {
        match serde_json::from_str::<PushEnvelope>(text) {
            Ok(envelope) => {
                self.deliver(&envelope.kind, &envelope.payload);
                true
            }
            Err(err) => {
                trace!(error = %err, "ignoring non-envelope push frame");
                false
            }
        }
    }
}

impl PushChannel for EventHub {
    fn subscribe(&self, category: &str, listener: PushListener) -> ListenerId {
        let mut state = self.state();
        state.next_id += 1;
        let id = ListenerId(state.next_id);
        state.listeners.push(RegisteredListener {
            id,
            category: category.to_string(),
            listener,
        });
        debug!(category, listener_id = id.0, "push listener registered");
        id
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut state = self.state();
        let before = state.listeners.len();
        state.listeners.retain(|registered| registered.id != id);
        before != state.listeners.len()
    }
}

/// Connects to the host's websocket and pumps every text frame into `hub`.
///
/// The returned task ends when the socket closes or errors; reconnecting is
/// left to the caller.
pub async fn connect_push_channel(ws_url: &str, hub: Arc<EventHub>) -> Result<JoinHandle<()>> {
    let (ws_stream, _) = connect_async(ws_url)
        .await
        .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
    info!(%ws_url, "push channel connected");
    let (_, mut ws_reader) = ws_stream.split();

    Ok(tokio::spawn(async move {
        while let Some(msg) = ws_reader.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    hub.deliver_frame(&text);
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "push channel receive failed");
                    break;
                }
            }
        }
        debug!("push channel closed");
    }))
}

#[cfg(test)]
#[path = "tests/push_channel_tests.rs"]
mod tests;
