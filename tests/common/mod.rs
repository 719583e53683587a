#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dollhouse_link::serial::{ConnectError, DeviceHandle, DeviceProvider, DuplexStream, PairedDevice};
use dollhouse_link::UiEvent;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

enum Chunk {
    Data(Vec<u8>),
    Fail(io::ErrorKind),
    Eof,
}

/// In-memory stream driven by a `StreamControl`
pub struct MockStream {
    incoming: Mutex<Receiver<Chunk>>,
    pending: Mutex<VecDeque<u8>>,
    written: Arc<Mutex<Vec<u8>>>,
    write_failures: Arc<AtomicUsize>,
    shut: Arc<AtomicBool>,
}

impl DuplexStream for MockStream {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.shut.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "stream shut down"));
        }

        let mut pending = self.pending.lock().unwrap();
        if pending.is_empty() {
            let chunk = self.incoming.lock().unwrap().recv_timeout(Duration::from_millis(10));
            match chunk {
                Ok(Chunk::Data(bytes)) => pending.extend(bytes),
                Ok(Chunk::Fail(kind)) => return Err(io::Error::new(kind, "injected read error")),
                Ok(Chunk::Eof) | Err(RecvTimeoutError::Disconnected) => return Ok(0),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "idle"))
                }
            }
        }

        let n = buf.len().min(pending.len());
        for (slot, byte) in buf.iter_mut().zip(pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        if self.shut.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream shut down"));
        }
        let failing = self
            .write_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected write error"));
        }
        self.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn shutdown(&self) -> io::Result<()> {
        self.shut.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Test-side handle of one opened `MockStream`
#[derive(Clone)]
pub struct StreamControl {
    tx: Sender<Chunk>,
    written: Arc<Mutex<Vec<u8>>>,
    write_failures: Arc<AtomicUsize>,
    shut: Arc<AtomicBool>,
}

impl StreamControl {
    /// Fail the next `count` writes with `BrokenPipe`
    pub fn fail_writes(&self, count: usize) {
        self.write_failures.store(count, Ordering::SeqCst);
    }

    pub fn feed(&self, bytes: &[u8]) {
        let _ = self.tx.send(Chunk::Data(bytes.to_vec()));
    }

    pub fn fail(&self, kind: io::ErrorKind) {
        let _ = self.tx.send(Chunk::Fail(kind));
    }

    pub fn eof(&self) {
        let _ = self.tx.send(Chunk::Eof);
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.written.lock().unwrap()).into_owned()
    }

    pub fn is_shut(&self) -> bool {
        self.shut.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockProvider {
    adapter_disabled: AtomicBool,
    fail_next: Mutex<Option<ConnectError>>,
    open_delay: Mutex<Option<Duration>>,
    preload: Mutex<Vec<u8>>,
    opens: AtomicUsize,
    write_failures: AtomicUsize,
    streams: Mutex<Vec<StreamControl>>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_adapter_enabled(&self, enabled: bool) {
        self.adapter_disabled.store(!enabled, Ordering::SeqCst);
    }

    pub fn fail_next_open(&self, error: ConnectError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock().unwrap() = Some(delay);
    }

    /// Bytes the next opened stream delivers on its first read
    pub fn preload(&self, bytes: &[u8]) {
        self.preload.lock().unwrap().extend_from_slice(bytes);
    }

    /// Writes the next opened stream fails before it starts accepting
    pub fn fail_first_writes(&self, count: usize) {
        self.write_failures.store(count, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn stream(&self, index: usize) -> Option<StreamControl> {
        self.streams.lock().unwrap().get(index).cloned()
    }

    pub fn last_stream(&self) -> Option<StreamControl> {
        self.streams.lock().unwrap().last().cloned()
    }
}

impl DeviceProvider for MockProvider {
    fn paired_devices(&self) -> Result<Vec<PairedDevice>, ConnectError> {
        Ok(vec![device()])
    }

    fn open(&self, _device: &PairedDevice, _service: Uuid) -> Result<Box<dyn DuplexStream>, ConnectError> {
        let delay = *self.open_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.opens.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }

        let (tx, rx) = mpsc::channel();
        let preload = std::mem::take(&mut *self.preload.lock().unwrap());
        if !preload.is_empty() {
            let _ = tx.send(Chunk::Data(preload));
        }

        let written = Arc::new(Mutex::new(Vec::new()));
        let shut = Arc::new(AtomicBool::new(false));
        let write_failures = Arc::new(AtomicUsize::new(self.write_failures.swap(0, Ordering::SeqCst)));
        self.streams.lock().unwrap().push(StreamControl {
            tx,
            written: written.clone(),
            write_failures: write_failures.clone(),
            shut: shut.clone(),
        });

        Ok(Box::new(MockStream {
            incoming: Mutex::new(rx),
            pending: Mutex::new(VecDeque::new()),
            written,
            write_failures,
            shut,
        }))
    }

    fn adapter_enabled(&self) -> bool {
        !self.adapter_disabled.load(Ordering::SeqCst)
    }
}

pub fn device() -> PairedDevice {
    PairedDevice::new("HC-05", "98:D3:31:F5:2A:10", DeviceHandle("/dev/rfcomm0".to_string()))
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub async fn next_ui_event(rx: &mut UnboundedReceiver<UiEvent>) -> Option<UiEvent> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.ok().flatten()
}

pub fn session(
    provider: Arc<MockProvider>,
) -> (dollhouse_link::Session, dollhouse_link::EventPump, UnboundedReceiver<UiEvent>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let (session, pump) =
        dollhouse_link::Session::new(provider, dollhouse_link::LinkSettings::default(), Arc::new(tx));
    (session, pump, rx)
}

/// Handle the next link event, giving up after two seconds
pub async fn pump_next(pump: &mut dollhouse_link::EventPump) -> bool {
    tokio::time::timeout(Duration::from_secs(2), pump.next()).await.unwrap_or(false)
}
