//! Command dispatcher
//!
//! Outbound: UI intents become encoded lines written to the live link.
//! Inbound: decoded lines become channel state updates and UI events.
//! Anything that does not parse as an incoming state line for a registered
//! channel is dropped without surfacing an error.
pub mod registry;
pub mod sink;

pub use registry::ChannelRegistry;
pub use sink::{NullSink, StateSink, UiEvent};

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::{ConnectionManager, DeviceError};
use crate::serial::{ChannelId, Command, CommandKind, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    SetChannel { channel: ChannelId, on: bool },
    QueryChannel { channel: ChannelId },
    /// Query every registered channel
    SyncAll,
}

/// What happened to an intent. Nothing is queued or retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    Sent,
    NotConnected,
    UnknownChannel,
    WriteFailed,
}

/// Last state reported by the device for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    pub channel: ChannelId,
    pub handle: String,
    /// `None` until the device has reported
    pub on: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct Dispatcher {
    registry: ChannelRegistry,
    states: RwLock<BTreeMap<ChannelId, ChannelState>>,
    manager: Arc<ConnectionManager>,
    sink: Arc<dyn StateSink>,
}

impl Dispatcher {
    pub fn new(registry: ChannelRegistry, manager: Arc<ConnectionManager>, sink: Arc<dyn StateSink>) -> Self {
        let states = registry
            .channels()
            .filter_map(|id| {
                let handle = registry.handle(id)?.to_string();
                Some((id, ChannelState { channel: id, handle, on: None, updated_at: None }))
            })
            .collect();

        Self {
            registry,
            states: RwLock::new(states),
            manager,
            sink,
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn submit(&self, intent: Intent) -> Delivery {
        match intent {
            Intent::SetChannel { channel, on } => self.send_for(channel, Command::set_state(channel, on)),
            Intent::QueryChannel { channel } => self.send_for(channel, Command::query_state(channel)),
            Intent::SyncAll => {
                // A failed query does not skip the remaining channels
                let mut outcome = Delivery::Sent;
                for channel in self.registry.channels() {
                    match self.send(Command::query_state(channel)) {
                        Delivery::NotConnected => return Delivery::NotConnected,
                        Delivery::WriteFailed => outcome = Delivery::WriteFailed,
                        _ => {}
                    }
                }
                outcome
            }
        }
    }

    pub fn set_channel(&self, channel: ChannelId, on: bool) -> Delivery {
        self.submit(Intent::SetChannel { channel, on })
    }

    pub fn query_channel(&self, channel: ChannelId) -> Delivery {
        self.submit(Intent::QueryChannel { channel })
    }

    pub fn sync_all(&self) -> Delivery {
        self.submit(Intent::SyncAll)
    }

    /// Apply one decoded line. Returns the new channel state, or `None` if
    /// the line was dropped.
    pub fn handle_line(&self, line: &str) -> Option<ChannelState> {
        let Some(command) = Command::parse(line) else {
            log::trace!("Dropping unparseable line {:?}", line);
            return None;
        };
        if command.direction() != Direction::Incoming {
            log::trace!("Dropping {} line from device", command.kind.tag());
            return None;
        }
        debug_assert!(matches!(command.kind, CommandKind::StateChanged | CommandKind::StateReport));

        let on = command.value?;
        let updated = {
            let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
            let Some(state) = states.get_mut(&command.channel) else {
                log::trace!("Dropping line for unknown channel {}", command.channel);
                return None;
            };
            state.on = Some(on);
            state.updated_at = Some(Utc::now());
            state.clone()
        };

        log::debug!("Channel {} ({}) is {}", updated.channel, updated.handle, if on { "on" } else { "off" });
        self.sink.notify(UiEvent::ChannelChanged {
            channel: updated.channel,
            handle: updated.handle.clone(),
            on,
        });
        Some(updated)
    }

    pub fn channel_state(&self, channel: ChannelId) -> Option<bool> {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        states.get(&channel).and_then(|s| s.on)
    }

    pub fn snapshot(&self) -> Vec<ChannelState> {
        let states = self.states.read().unwrap_or_else(|e| e.into_inner());
        states.values().cloned().collect()
    }

    fn send_for(&self, channel: ChannelId, command: Command) -> Delivery {
        if !self.registry.contains(channel) {
            log::warn!("Ignoring intent for unregistered channel {}", channel);
            return Delivery::UnknownChannel;
        }
        self.send(command)
    }

    fn send(&self, command: Command) -> Delivery {
        match self.manager.write(&command.encode()) {
            Ok(()) => Delivery::Sent,
            Err(DeviceError::NotConnected) => {
                log::debug!("Not connected, dropping {} for channel {}", command.kind.tag(), command.channel);
                Delivery::NotConnected
            }
            Err(e) => {
                log::warn!("Failed to send {} for channel {}: {}", command.kind.tag(), command.channel, e);
                Delivery::WriteFailed
            }
        }
    }
}
