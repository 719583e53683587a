use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::serial::ChannelId;

/// Notifications rendered by the UI shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UiEvent {
    Connected { device: String },
    ConnectFailed { reason: String },
    Disconnected,
    ChannelChanged { channel: ChannelId, handle: String, on: bool },
}

/// Receiver of UI notifications. Called from the event pump only.
pub trait StateSink: Send + Sync {
    fn notify(&self, event: UiEvent);
}

impl StateSink for mpsc::UnboundedSender<UiEvent> {
    fn notify(&self, event: UiEvent) {
        if self.send(event).is_err() {
            log::debug!("UI event receiver dropped");
        }
    }
}

/// Sink for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StateSink for NullSink {
    fn notify(&self, event: UiEvent) {
        log::trace!("Discarding UI event {:?}", event);
    }
}
