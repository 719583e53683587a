//! One open RFCOMM link and its reader thread
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use super::events::{DisconnectCause, LinkEvent, NotificationSender};
use super::interface::{DeviceProvider, DuplexStream};
use super::{ConnectError, PairedDevice, ReadTermination, Result, WriteError};
use crate::config::LinkSettings;

pub struct SerialLink {
    stream: Arc<dyn DuplexStream>,
    closed: Arc<AtomicBool>,
    device: PairedDevice,
    read_buffer_size: usize,
    reading: bool,
}

impl SerialLink {
    /// Open a stream to `device`. Blocks until the platform connect returns,
    /// so call it from a worker, never from the UI context.
    pub fn open(provider: &dyn DeviceProvider, device: &PairedDevice, settings: &LinkSettings) -> Result<Self> {
        log::info!("Connecting to {}", device.label());
        let stream = provider.open(device, settings.service_uuid)?;
        Ok(Self::from_stream(stream, device.clone(), settings.read_buffer_size))
    }

    pub fn from_stream(stream: Box<dyn DuplexStream>, device: PairedDevice, read_buffer_size: usize) -> Self {
        Self {
            stream: Arc::from(stream),
            closed: Arc::new(AtomicBool::new(false)),
            device,
            read_buffer_size: read_buffer_size.max(1),
            reading: false,
        }
    }

    /// Start the read loop on its own thread. Every event it emits is tagged
    /// with `attempt`.
    pub fn start(&mut self, notifier: NotificationSender, attempt: u64) -> Result<()> {
        if self.reading {
            return Ok(());
        }
        if self.is_closed() {
            return Err(ConnectError::Io("link already closed".to_string()));
        }

        let stream = self.stream.clone();
        let closed = self.closed.clone();
        let buffer_size = self.read_buffer_size;
        thread::Builder::new()
            .name(format!("rfcomm-reader-{}", attempt))
            .spawn(move || read_loop(stream, closed, notifier, attempt, buffer_size))?;

        self.reading = true;
        Ok(())
    }

    /// Best effort: the caller decides whether a failure matters.
    pub fn write(&self, bytes: &[u8]) -> std::result::Result<(), WriteError> {
        if self.is_closed() {
            return Err(WriteError::Closed);
        }
        self.stream.write_all(bytes).map_err(|e| {
            log::warn!("Write to {} failed: {}", self.device.name, e);
            WriteError::Io(e)
        })
    }

    /// Idempotent. Unblocks the reader, which then exits without reporting.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        log::info!("Closing link to {}", self.device.name);
        if let Err(e) = self.stream.shutdown() {
            log::debug!("Ignoring shutdown error on {}: {}", self.device.name, e);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn device(&self) -> &PairedDevice {
        &self.device
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device", &self.device.name)
            .field("closed", &self.is_closed())
            .field("reading", &self.reading)
            .finish()
    }
}

fn read_loop(
    stream: Arc<dyn DuplexStream>,
    closed: Arc<AtomicBool>,
    notifier: NotificationSender,
    attempt: u64,
    buffer_size: usize,
) {
    log::debug!("Reader for attempt {} started", attempt);
    let mut buf = vec![0u8; buffer_size];

    let termination = loop {
        if closed.load(Ordering::Acquire) {
            break None;
        }
        match stream.read(&mut buf) {
            Ok(0) => break Some(ReadTermination::EndOfStream),
            Ok(n) => {
                if !notifier.send(LinkEvent::Data { attempt, bytes: buf[..n].to_vec() }) {
                    break None;
                }
            }
            Err(ref e) if is_idle(e) => continue,
            Err(e) => break Some(ReadTermination::Io(e.to_string())),
        }
    };

    // A requested close can surface as an I/O error; it is reported by the
    // closer, not here.
    match termination {
        Some(reason) if !closed.load(Ordering::Acquire) => {
            log::info!("Reader for attempt {} stopped: {}", attempt, reason);
            notifier.send(LinkEvent::Disconnected { attempt, cause: DisconnectCause::Lost(reason) });
        }
        _ => log::debug!("Reader for attempt {} exited after close", attempt),
    }
}

fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
