//! Outbound command channel to the broker's dynamic-security control topic.
//!
//! # Purpose
//! Abstracts "send one batch of admin commands" so the synchronizer does not
//! depend on a particular MQTT client, and so tests can capture the exact
//! publish sequence.
//!
//! # Key invariants
//! - One `publish` call produces at most one control-topic message.
//! - Publication is fire-and-forget: `Ok(())` means the message was handed to
//!   the transport, not that the broker applied it.
use crate::command::CommandBatch;
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("not connected to broker")]
    Disconnected,
    #[error("encode command batch: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("publish rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn publish(&self, batch: &CommandBatch) -> Result<(), ChannelError>;
}

/// In-process channel that records every published batch.
///
/// With [`MemoryChannel::failing_from`] the channel accepts the first `n`
/// publishes and rejects every later one with [`ChannelError::Disconnected`],
/// which lets tests reproduce a connection drop between two publishes.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    published: Mutex<Vec<CommandBatch>>,
    fail_from: Option<usize>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_from(accepted: usize) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail_from: Some(accepted),
        }
    }

    /// Batches accepted so far, in publish order.
    pub fn published(&self) -> Vec<CommandBatch> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn publish_count(&self) -> usize {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl CommandChannel for MemoryChannel {
    async fn publish(&self, batch: &CommandBatch) -> Result<(), ChannelError> {
        // Encode like a real transport would so unserializable batches fail here too.
        batch.to_json()?;
        let mut published = self
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.fail_from.is_some_and(|limit| published.len() >= limit) {
            return Err(ChannelError::Disconnected);
        }
        published.push(batch.clone());
        Ok(())
    }
}
