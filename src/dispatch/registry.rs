use std::collections::BTreeMap;

use crate::config::ChannelBinding;
use crate::serial::ChannelId;

/// Static channel id -> UI handle table, fixed for the process lifetime
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    handles: BTreeMap<ChannelId, String>,
}

impl ChannelRegistry {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (ChannelId, S)>,
        S: Into<String>,
    {
        Self {
            handles: entries.into_iter().map(|(id, h)| (id, h.into())).collect(),
        }
    }

    /// Build from settings, skipping bindings whose id is not a single
    /// printable character
    pub fn from_bindings(bindings: &[ChannelBinding]) -> Self {
        let mut handles = BTreeMap::new();
        for binding in bindings {
            match ChannelId::try_from(binding.channel.as_str()) {
                Ok(id) => {
                    handles.insert(id, binding.handle.clone());
                }
                Err(e) => log::warn!("Skipping channel binding {:?}: {}", binding.handle, e),
            }
        }
        Self { handles }
    }

    pub fn handle(&self, channel: ChannelId) -> Option<&str> {
        self.handles.get(&channel).map(String::as_str)
    }

    pub fn channel_for_handle(&self, handle: &str) -> Option<ChannelId> {
        self.handles
            .iter()
            .find(|(_, h)| h.as_str() == handle)
            .map(|(id, _)| *id)
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        self.handles.contains_key(&channel)
    }

    /// Registered channels in ascending order
    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.handles.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
