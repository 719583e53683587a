//! Cross-thread notification channel between link threads and the event pump
//!
//! Backed by an unbounded Tokio mpsc channel: strict FIFO, and the send side
//! works from plain OS threads without a runtime.
use tokio::sync::mpsc;

use super::{ConnectError, PairedDevice, ReadTermination};

#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectCause {
    /// `request_disconnect` closed the link
    Requested,
    /// The read loop stopped on its own
    Lost(ReadTermination),
}

#[derive(Debug)]
pub enum LinkEvent {
    Connected { attempt: u64, device: PairedDevice },
    ConnectFailed { attempt: u64, device: PairedDevice, error: ConnectError },
    /// Raw bytes from one successful read, not yet framed
    Data { attempt: u64, bytes: Vec<u8> },
    Disconnected { attempt: u64, cause: DisconnectCause },
    Shutdown,
}

impl LinkEvent {
    pub fn attempt(&self) -> Option<u64> {
        match self {
            LinkEvent::Connected { attempt, .. }
            | LinkEvent::ConnectFailed { attempt, .. }
            | LinkEvent::Data { attempt, .. }
            | LinkEvent::Disconnected { attempt, .. } => Some(*attempt),
            LinkEvent::Shutdown => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<LinkEvent>,
}

impl NotificationSender {
    /// Queue an event. Returns `false` once the consumer is gone.
    pub fn send(&self, event: LinkEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                log::debug!("Dropping link event, consumer closed: {:?}", event);
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct NotificationReceiver {
    rx: mpsc::UnboundedReceiver<LinkEvent>,
}

impl NotificationReceiver {
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<LinkEvent> {
        self.rx.try_recv().ok()
    }
}

pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NotificationSender { tx }, NotificationReceiver { rx })
}
