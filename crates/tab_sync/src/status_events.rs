//! Subscription to `tab_status` push events with payload validation.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde::Deserialize;
use serde_json::Value;
use shared::{
    domain::{TabIndex, TabStatus},
    protocol::{TabStatusPayload, TAB_STATUS_EVENT},
};
use tracing::trace;

use crate::push_channel::{ListenerId, PushChannel, PushListener};

/// A validated status change carried by one push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub index: TabIndex,
    pub status: TabStatus,
    pub message: Option<String>,
}

/// Validates a raw `tab_status` payload.
///
/// Returns `None` for anything that is not an object with a non-negative
/// integer `tab_index`, a known `state`, and a string or null `message`.
pub fn parse_status_payload(payload: &Value) -> Option<StatusEvent> {
    if !payload.is_object() {
        return None;
    }
    let parsed = TabStatusPayload::deserialize(payload).ok()?;
    let index = usize::try_from(parsed.tab_index).ok()?;
    Some(StatusEvent {
        index: TabIndex(index),
        status: parsed.state,
        message: parsed.message,
    })
}

pub struct StatusEventSubscriber {
    channel: Arc<dyn PushChannel>,
}

impl StatusEventSubscriber {
    pub fn new(channel: Arc<dyn PushChannel>) -> Self {
        Self { channel }
    }

    /// Registers `on_status_change` for well-formed status events.
    ///
    /// The callback runs synchronously on the delivering task, once per
    /// event, in channel order. Malformed payloads never reach it.
    pub fn subscribe<F>(&self, on_status_change: F) -> StatusSubscription
    where
        F: Fn(TabIndex, TabStatus) + Send + Sync + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let listener: PushListener = {
            let active = Arc::clone(&active);
            Arc::new(move |payload: &Value| {
                if !active.load(Ordering::SeqCst) {
                    return;
                }
                match parse_status_payload(payload) {
                    Some(event) => {
                        trace!(
                            tab_index = event.index.0,
                            status = %event.status,
                            message = event.message.as_deref().unwrap_or_default(),
                            "tab status event received"
                        );
                        on_status_change(event.index, event.status);
                    }
                    None => trace!(%payload, "dropping malformed tab status payload"),
                }
            })
        };
        let id = self.channel.subscribe(TAB_STATUS_EVENT, listener);
        StatusSubscription {
            channel: Arc::clone(&self.channel),
            id,
            active,
        }
    }
}

/// Handle for one status listener. Dropping it unsubscribes.
pub struct StatusSubscription {
    channel: Arc<dyn PushChannel>,
    id: ListenerId,
    active: Arc<AtomicBool>,
}

impl StatusSubscription {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stops callback delivery. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        // Flag first: a delivery racing with removal must not reach the callback.
        if self.active.swap(false, Ordering::SeqCst) {
            self.channel.unsubscribe(self.id);
        }
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
#[path = "tests/status_events_tests.rs"]
mod tests;
