use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::LinkSettings;
use crate::serial::{
    self, ConnectError, DeviceProvider, DisconnectCause, LinkEvent, NotificationSender, SerialLink,
};
use super::{ConnectionState, DeviceError, PairedDevice, Result};

/// Owns the link lifecycle.
///
/// State and link live behind one mutex; every transition, whether requested
/// by the UI, committed by the connect task or reported by the event pump,
/// takes it. Results are tagged with an attempt id so a superseded connect or
/// a dead reader can never overwrite a newer state.
pub struct ConnectionManager {
    inner: Arc<Mutex<Inner>>,
    provider: Arc<dyn DeviceProvider>,
    settings: Arc<LinkSettings>,
    notifier: NotificationSender,
}

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    link: Option<SerialLink>,
    attempt: u64,
    device: Option<PairedDevice>,
}

impl ConnectionManager {
    pub fn new(
        provider: Arc<dyn DeviceProvider>,
        settings: Arc<LinkSettings>,
        notifier: NotificationSender,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            provider,
            settings,
            notifier,
        }
    }

    /// Devices already paired with the adapter
    pub fn paired_devices(&self) -> Result<Vec<PairedDevice>> {
        Ok(self.provider.paired_devices()?)
    }

    /// Start connecting to `device` on Tokio's blocking pool.
    ///
    /// Returns the attempt id; the outcome arrives later as a `Connected` or
    /// `ConnectFailed` event carrying that id.
    pub fn request_connect(&self, device: PairedDevice) -> Result<u64> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| DeviceError::NoRuntime)?;

        let attempt = {
            let mut inner = self.lock();
            if !inner.state.can_connect() {
                return Err(match inner.state {
                    ConnectionState::Connecting => DeviceError::ConnectInProgress,
                    _ => DeviceError::AlreadyConnected,
                });
            }
            if !self.provider.adapter_enabled() {
                return Err(ConnectError::AdapterDisabled.into());
            }

            inner.attempt += 1;
            inner.state = ConnectionState::Connecting;
            inner.device = Some(device.clone());
            inner.attempt
        };

        log::info!("Connect attempt {} to {}", attempt, device.label());

        let inner = self.inner.clone();
        let provider = self.provider.clone();
        let settings = self.settings.clone();
        let notifier = self.notifier.clone();
        runtime.spawn_blocking(move || {
            let result = SerialLink::open(provider.as_ref(), &device, &settings);
            complete_connect(&inner, &notifier, attempt, device, result);
        });

        Ok(attempt)
    }

    /// Close the link if connecting or connected. Returns `false` (and does
    /// nothing) from any other state.
    pub fn request_disconnect(&self) -> bool {
        let mut inner = self.lock();
        if !inner.state.is_active() {
            log::debug!("Disconnect ignored in state {:?}", inner.state);
            return false;
        }

        if let Some(link) = inner.link.take() {
            link.close();
        }
        inner.state = ConnectionState::Disconnected;
        log::info!("Disconnected (attempt {})", inner.attempt);
        self.notifier.send(LinkEvent::Disconnected {
            attempt: inner.attempt,
            cause: DisconnectCause::Requested,
        });
        true
    }

    /// The reader of `attempt` stopped on its own. Returns `true` if this
    /// moved the live connection to Disconnected.
    pub fn link_lost(&self, attempt: u64) -> bool {
        let mut inner = self.lock();
        if inner.attempt != attempt || !inner.state.is_connected() {
            return false;
        }

        if let Some(link) = inner.link.take() {
            link.close();
        }
        inner.state = ConnectionState::Disconnected;
        log::warn!("Link lost (attempt {})", attempt);
        true
    }

    /// Forward one encoded line to the live link
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let inner = self.lock();
        match (&inner.state, inner.link.as_ref()) {
            (ConnectionState::Connected, Some(link)) => Ok(link.write(bytes)?),
            _ => Err(DeviceError::NotConnected),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().state.is_connected()
    }

    /// Whether `attempt` is the one currently connected
    pub fn is_live(&self, attempt: u64) -> bool {
        let inner = self.lock();
        inner.attempt == attempt && inner.state.is_connected()
    }

    pub fn current_attempt(&self) -> u64 {
        self.lock().attempt
    }

    /// Device of the most recent connect request
    pub fn device(&self) -> Option<PairedDevice> {
        self.lock().device.clone()
    }

    pub fn adapter_enabled(&self) -> bool {
        self.provider.adapter_enabled()
    }

    pub(crate) fn notifier(&self) -> &NotificationSender {
        &self.notifier
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let mut inner = self.lock();
        if let Some(link) = inner.link.take() {
            link.close();
        }
    }
}

/// Commit the outcome of a connect task, unless the attempt was superseded
fn complete_connect(
    inner: &Mutex<Inner>,
    notifier: &NotificationSender,
    attempt: u64,
    device: PairedDevice,
    result: serial::Result<SerialLink>,
) {
    let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);

    if inner.attempt != attempt || inner.state != ConnectionState::Connecting {
        log::info!("Discarding result of superseded connect attempt {}", attempt);
        if let Ok(link) = result {
            link.close();
        }
        return;
    }

    match result {
        Ok(mut link) => {
            // Connected is queued before the reader can queue any data.
            inner.state = ConnectionState::Connected;
            notifier.send(LinkEvent::Connected { attempt, device: device.clone() });

            match link.start(notifier.clone(), attempt) {
                Ok(()) => {
                    log::info!("Connected to {} (attempt {})", device.label(), attempt);
                    inner.link = Some(link);
                }
                Err(e) => {
                    log::error!("Failed to start reader for {}: {}", device.label(), e);
                    link.close();
                    inner.state = ConnectionState::Failed(e.to_string());
                    notifier.send(LinkEvent::ConnectFailed { attempt, device, error: e });
                }
            }
        }
        Err(e) => {
            log::warn!("Connect attempt {} to {} failed: {}", attempt, device.label(), e);
            inner.state = ConnectionState::Failed(e.to_string());
            inner.link = None;
            notifier.send(LinkEvent::ConnectFailed { attempt, device, error: e });
        }
    }
}
