//! Table of live channels.

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::channel::Channel;

/// Live channels indexed by id.
#[derive(Debug, Default)]
pub struct ChannelTable {
    channels: DashMap<String, Channel>,
}

impl ChannelTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a channel.
    pub fn insert(&self, channel: Channel) {
        let _ = self.channels.insert(channel.id().to_owned(), channel);
    }

    /// Stop tracking a channel.
    pub fn remove(&self, id: &str) -> Option<Channel> {
        self.channels.remove(id).map(|(_, channel)| channel)
    }

    /// Channel by id.
    pub fn get(&self, id: &str) -> Option<Channel> {
        self.channels.get(id).map(|entry| entry.value().clone())
    }

    /// Number of live channels.
    pub fn count(&self) -> usize {
        self.channels.len()
    }

    /// Ids of all live channels (sorted).
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Emit `method` to every live channel.
    ///
    /// Returns how many channels accepted the frame; failures (e.g. a full
    /// queue) are logged and skipped.
    pub fn emit_all<T: Serialize + ?Sized>(&self, method: &str, args: &T) -> usize {
        let mut delivered = 0;
        for entry in &self.channels {
            match entry.value().emit(method, args) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(channel_id = %entry.key(), method, error = %e, "failed to emit to channel");
                }
            }
        }
        debug!(method, recipients = delivered, "emit to all channels");
        delivered
    }

    /// Close every live channel.
    pub fn close_all(&self) {
        for entry in &self.channels {
            entry.value().close();
        }
    }
}
