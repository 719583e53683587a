//! Owning context for one device connection
//!
//! `Session` is the UI-facing handle; `EventPump` is the single consumer of
//! link events and the only owner of the line decoder.
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::LinkSettings;
use crate::device::{self, ConnectionManager, ConnectionState, PairedDevice};
use crate::dispatch::{ChannelRegistry, ChannelState, Delivery, Dispatcher, StateSink, UiEvent};
use crate::serial::{
    notification_channel, ChannelId, DeviceProvider, DisconnectCause, LineDecoder, LinkEvent,
    NotificationReceiver,
};

pub struct Session {
    manager: Arc<ConnectionManager>,
    dispatcher: Arc<Dispatcher>,
}

impl Session {
    pub fn new(
        provider: Arc<dyn DeviceProvider>,
        settings: LinkSettings,
        sink: Arc<dyn StateSink>,
    ) -> (Session, EventPump) {
        let settings = Arc::new(settings);
        let (notifier, receiver) = notification_channel();
        let manager = Arc::new(ConnectionManager::new(provider, settings.clone(), notifier));
        let registry = ChannelRegistry::from_bindings(&settings.channels);
        let dispatcher = Arc::new(Dispatcher::new(registry, manager.clone(), sink.clone()));

        let pump = EventPump {
            receiver,
            decoder: LineDecoder::new(),
            manager: manager.clone(),
            dispatcher: dispatcher.clone(),
            sink,
            sync_on_connect: settings.sync_on_connect,
            metrics: PumpMetrics::default(),
        };

        (Session { manager, dispatcher }, pump)
    }

    pub fn paired_devices(&self) -> device::Result<Vec<PairedDevice>> {
        self.manager.paired_devices()
    }

    /// Begin connecting. The outcome is delivered through the sink.
    pub fn connect(&self, device: PairedDevice) -> device::Result<u64> {
        self.manager.request_connect(device)
    }

    pub fn disconnect(&self) -> bool {
        self.manager.request_disconnect()
    }

    /// Disconnect if a link is connecting or up, otherwise connect to
    /// `device`. Returns the new attempt id when a connect was started.
    pub fn toggle_connection(&self, device: PairedDevice) -> device::Result<Option<u64>> {
        if self.manager.request_disconnect() {
            return Ok(None);
        }
        self.manager.request_connect(device).map(Some)
    }

    pub fn set_channel(&self, channel: ChannelId, on: bool) -> Delivery {
        self.dispatcher.set_channel(channel, on)
    }

    pub fn query_channel(&self, channel: ChannelId) -> Delivery {
        self.dispatcher.query_channel(channel)
    }

    pub fn sync_channels(&self) -> Delivery {
        self.dispatcher.sync_all()
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn channel_states(&self) -> Vec<ChannelState> {
        self.dispatcher.snapshot()
    }

    /// Last reported state of one channel, `None` before any report
    pub fn channel_state(&self, channel: ChannelId) -> Option<bool> {
        self.dispatcher.channel_state(channel)
    }

    /// Device of the most recent connect, for reconnecting
    pub fn last_device(&self) -> Option<PairedDevice> {
        self.manager.device()
    }

    pub fn adapter_enabled(&self) -> bool {
        self.manager.adapter_enabled()
    }

    pub fn registry(&self) -> &ChannelRegistry {
        self.dispatcher.registry()
    }

    /// Close any link and stop the pump once it reaches this point in the
    /// event queue
    pub fn shutdown(&self) {
        self.manager.request_disconnect();
        self.manager.notifier().send(LinkEvent::Shutdown);
    }
}

/// Counters kept by the event pump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpMetrics {
    pub bytes_received: u64,
    pub lines_decoded: u64,
    pub lines_dropped: u64,
    pub stale_events: u64,
}

pub struct EventPump {
    receiver: NotificationReceiver,
    decoder: LineDecoder,
    manager: Arc<ConnectionManager>,
    dispatcher: Arc<Dispatcher>,
    sink: Arc<dyn StateSink>,
    sync_on_connect: bool,
    metrics: PumpMetrics,
}

impl EventPump {
    /// Handle events until `Session::shutdown`
    pub async fn run(mut self) -> PumpMetrics {
        log::debug!("Event pump started");
        while self.next().await {}
        log::debug!("Event pump stopped: {:?}", self.metrics);
        self.metrics
    }

    /// Wait for and handle one event. Returns `false` on shutdown.
    pub async fn next(&mut self) -> bool {
        match self.receiver.recv().await {
            Some(event) => self.handle_event(event),
            None => false,
        }
    }

    /// Handle every event already queued without waiting. Returns the number
    /// handled, stopping early at a shutdown.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.receiver.try_recv() {
            handled += 1;
            if !self.handle_event(event) {
                break;
            }
        }
        handled
    }

    /// Returns `false` for `Shutdown`
    pub fn handle_event(&mut self, event: LinkEvent) -> bool {
        match event {
            LinkEvent::Connected { attempt, device } => {
                if !self.manager.is_live(attempt) {
                    self.stale(attempt);
                    return true;
                }
                self.decoder.clear();
                self.sink.notify(UiEvent::Connected { device: device.name });
                if self.sync_on_connect {
                    self.dispatcher.sync_all();
                }
            }
            LinkEvent::ConnectFailed { attempt, error, .. } => {
                if attempt != self.manager.current_attempt() {
                    self.stale(attempt);
                    return true;
                }
                self.sink.notify(UiEvent::ConnectFailed { reason: error.to_string() });
            }
            LinkEvent::Data { attempt, bytes } => {
                if !self.manager.is_live(attempt) {
                    self.stale(attempt);
                    return true;
                }
                self.metrics.bytes_received += bytes.len() as u64;
                for line in self.decoder.decode(&bytes) {
                    self.metrics.lines_decoded += 1;
                    if self.dispatcher.handle_line(&line).is_none() {
                        self.metrics.lines_dropped += 1;
                    }
                }
            }
            LinkEvent::Disconnected { attempt, cause } => match cause {
                DisconnectCause::Requested => {
                    self.decoder.clear();
                    self.sink.notify(UiEvent::Disconnected);
                }
                DisconnectCause::Lost(reason) => {
                    if self.manager.link_lost(attempt) {
                        log::info!("Connection lost: {:?}", reason);
                        self.decoder.clear();
                        self.sink.notify(UiEvent::Disconnected);
                    } else {
                        self.stale(attempt);
                    }
                }
            },
            LinkEvent::Shutdown => return false,
        }
        true
    }

    pub fn metrics(&self) -> PumpMetrics {
        self.metrics
    }

    fn stale(&mut self, attempt: u64) {
        log::trace!("Ignoring event from stale attempt {}", attempt);
        self.metrics.stale_events += 1;
    }
}
