use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serialport::{SerialPort, SerialPortType};
use uuid::Uuid;

use super::{ConnectError, DeviceHandle, PairedDevice, Result};
use crate::config::LinkSettings;

/// Bluetooth Serial Port Profile service class
pub const SPP_SERVICE_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Blocking duplex byte stream shared between the read loop and writers.
///
/// Reads may return `TimedOut`/`WouldBlock` as idle ticks. After
/// [`shutdown`](DuplexStream::shutdown) every read and write must fail.
pub trait DuplexStream: Send + Sync {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    fn write_all(&self, data: &[u8]) -> io::Result<()>;

    fn shutdown(&self) -> io::Result<()>;
}

/// Platform Bluetooth stack as seen by the link layer
pub trait DeviceProvider: Send + Sync {
    /// Devices already paired with the local adapter
    fn paired_devices(&self) -> Result<Vec<PairedDevice>>;

    /// Open a stream to `device` for the given service. May block for a long
    /// time; a failed open must release the socket before returning.
    fn open(&self, device: &PairedDevice, service: Uuid) -> Result<Box<dyn DuplexStream>>;

    fn adapter_enabled(&self) -> bool {
        true
    }
}

/// Provider over RFCOMM channels the OS already exposes as serial ports
/// (`rfcomm bind` on Linux, `/dev/cu.*` Bluetooth ports on macOS, outgoing
/// Bluetooth COM ports on Windows).
#[derive(Debug, Clone)]
pub struct SerialPortProvider {
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialPortProvider {
    pub fn new(settings: &LinkSettings) -> Self {
        Self {
            baud_rate: settings.baud_rate,
            read_timeout: settings.read_timeout(),
        }
    }
}

impl DeviceProvider for SerialPortProvider {
    fn paired_devices(&self) -> Result<Vec<PairedDevice>> {
        let ports = serialport::available_ports()?;
        let mut devices = Vec::new();

        for port in ports {
            let bluetooth = matches!(port.port_type, SerialPortType::BluetoothPort)
                || is_rfcomm_port(&port.port_name);
            if !bluetooth {
                continue;
            }
            devices.push(PairedDevice::new(
                display_name(&port.port_name),
                port.port_name.clone(),
                DeviceHandle(port.port_name),
            ));
        }

        log::debug!("Found {} Bluetooth serial ports", devices.len());
        Ok(devices)
    }

    fn open(&self, device: &PairedDevice, service: Uuid) -> Result<Box<dyn DuplexStream>> {
        // The service record was resolved when the OS bound the port.
        log::debug!("Opening {} for service {}", device.handle.0, service);

        let port = serialport::new(device.handle.0.as_str(), self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| {
                log::warn!("Failed to open {}: {}", device.handle.0, e);
                ConnectError::from(e)
            })?;

        Ok(Box::new(SerialPortStream::new(port)?))
    }
}

fn is_rfcomm_port(port_name: &str) -> bool {
    port_name.starts_with("/dev/rfcomm")
        || (port_name.starts_with("/dev/cu.") && port_name.contains("Bluetooth"))
}

/// `/dev/cu.HC-05-SerialPort` -> `HC-05`, `/dev/rfcomm0` -> `rfcomm0`
fn display_name(port_name: &str) -> String {
    let base = port_name.rsplit('/').next().unwrap_or(port_name);
    let base = base.strip_prefix("cu.").unwrap_or(base);
    base.strip_suffix("-SerialPort").unwrap_or(base).to_string()
}

/// [`DuplexStream`] over a `serialport` handle and its clone
pub struct SerialPortStream {
    reader: Mutex<Box<dyn SerialPort>>,
    writer: Mutex<Box<dyn SerialPort>>,
    closed: AtomicBool,
}

impl SerialPortStream {
    pub fn new(port: Box<dyn SerialPort>) -> Result<Self> {
        let writer = port.try_clone()?;
        Ok(Self {
            reader: Mutex::new(port),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"))
        } else {
            Ok(())
        }
    }
}

impl DuplexStream for SerialPortStream {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_open()?;
        let mut port = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        port.read(buf)
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        self.ensure_open()?;
        let mut port = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        port.write_all(data)?;
        port.flush()
    }

    fn shutdown(&self) -> io::Result<()> {
        // Handles are released on drop; a read in flight returns within one
        // port timeout and then sees the flag.
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
