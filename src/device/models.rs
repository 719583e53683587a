use serde::{Deserialize, Serialize};

pub use crate::serial::{DeviceHandle, PairedDevice};

/// Link lifecycle state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Failed(String),
}

impl ConnectionState {
    /// A new connect request is accepted only from these states
    pub fn can_connect(&self) -> bool {
        matches!(
            self,
            ConnectionState::Idle | ConnectionState::Disconnected | ConnectionState::Failed(_)
        )
    }

    /// Connecting or connected: there is something to disconnect
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}
