pub mod manager;
pub mod models;

pub use manager::ConnectionManager;
pub use models::*;


#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Device already connected")]
    AlreadyConnected,

    #[error("Connection already in progress")]
    ConnectInProgress,

    #[error("Device not connected")]
    NotConnected,

    #[error("No Tokio runtime available to run the connect task")]
    NoRuntime,

    #[error("Connection failed: {0}")]
    Connect(#[from] crate::serial::ConnectError),

    #[error("Write failed: {0}")]
    Write(#[from] crate::serial::WriteError),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
