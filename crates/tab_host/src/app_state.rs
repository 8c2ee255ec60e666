use std::time::Duration;

use shared::protocol::{RawTabRecord, ServerEvent};
use tokio::sync::broadcast;

pub(crate) struct AppState {
    pub(crate) tabs: Vec<RawTabRecord>,
    pub(crate) failing_restarts: Vec<usize>,
    pub(crate) restart_delay: Duration,
    pub(crate) events: broadcast::Sender<ServerEvent>,
}
