pub mod codec;
pub mod events;
pub mod interface;
pub mod link;

pub use codec::{ChannelId, Command, CommandKind, Direction, LineDecoder};
pub use events::{notification_channel, DisconnectCause, LinkEvent, NotificationReceiver, NotificationSender};
pub use interface::{DeviceProvider, DuplexStream, SerialPortProvider, SPP_SERVICE_UUID};
pub use link::SerialLink;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque platform handle used to open a stream to a paired device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle(pub String);

/// A device already paired with the local adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedDevice {
    pub name: String,
    pub address: String,
    pub handle: DeviceHandle,
    pub last_seen: DateTime<Utc>,
}

impl PairedDevice {
    pub fn new(name: impl Into<String>, address: impl Into<String>, handle: DeviceHandle) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            handle,
            last_seen: Utc::now(),
        }
    }

    /// Label shown in device pickers, e.g. `HC-05 (98:D3:31:F5:2A:10)`
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.address)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectError {
    #[error("Bluetooth adapter is disabled")]
    AdapterDisabled,

    #[error("Device unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ConnectError {
    fn from(e: std::io::Error) -> Self {
        ConnectError::Io(e.to_string())
    }
}

impl From<serialport::Error> for ConnectError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::NoDevice => ConnectError::Unavailable(e.to_string()),
            _ => ConnectError::Io(e.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Link closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a read loop stopped. Both variants surface to the UI as a plain disconnect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadTermination {
    #[error("End of stream")]
    EndOfStream,

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, ConnectError>;
