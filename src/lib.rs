//! Bluetooth serial remote control for the dollhouse light controller.
//!
//! A `Session` connects to one paired device over an RFCOMM serial link,
//! turns UI intents into `LSS`/`LQS` lines and turns the `LSC`/`LSR` lines
//! the device sends back into channel state updates for the UI.
pub mod config;
pub mod device;
pub mod dispatch;
pub mod serial;
pub mod session;

pub use config::{ChannelBinding, LinkSettings};
pub use device::{ConnectionManager, ConnectionState, DeviceError};
pub use dispatch::{ChannelState, Delivery, Dispatcher, Intent, NullSink, StateSink, UiEvent};
pub use serial::{
  ChannelId, Command, CommandKind, ConnectError, DeviceProvider, DuplexStream, PairedDevice,
  SerialPortProvider,
};
pub use session::{EventPump, PumpMetrics, Session};
