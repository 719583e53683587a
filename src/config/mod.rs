//! Link settings
//!
//! Stored as JSON; every field has a default so partial files load.
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::serial::SPP_SERVICE_UUID;

/// Binds one protocol channel to the UI control that renders it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBinding {
    pub channel: String,
    pub handle: String,
}

impl ChannelBinding {
    pub fn new(channel: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            handle: handle.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Bytes requested per read
    pub read_buffer_size: usize,
    /// Poll interval of the reader; bounds how long a close takes to unblock it
    pub read_timeout_ms: u64,
    /// Only used by tty-backed RFCOMM ports
    pub baud_rate: u32,
    pub service_uuid: Uuid,
    pub channels: Vec<ChannelBinding>,
    /// Query every channel right after connecting
    pub sync_on_connect: bool,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            read_buffer_size: 1024,
            read_timeout_ms: 100,
            baud_rate: 9600,
            service_uuid: SPP_SERVICE_UUID,
            channels: (0..4)
                .map(|i| ChannelBinding::new(i.to_string(), format!("led{}", i + 1)))
                .collect(),
            sync_on_connect: true,
        }
    }
}

impl LinkSettings {
    /// Never zero: a zero port timeout makes the reader spin
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Invalid link settings")
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize link settings")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings = Self::from_json(&text)?;
        log::info!("Loaded link settings from {}", path.display());
        Ok(settings)
    }

    /// Load `path`, falling back to defaults when the file is missing or bad
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{:#}; using default link settings", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}
