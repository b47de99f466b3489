//! Exchange data source contract
//!
//! A `Source` is a live connector to one exchange emitting batches of raw
//! ticks keyed by that exchange's symbols. Concrete connectors (websocket
//! protocol parsing etc.) live outside this crate; they plug in either by
//! implementing [`Source`] directly or by pushing batches through a
//! [`ChannelSource`]. Connector constructors are looked up by exchange name
//! in a [`SourceRegistry`] so new exchanges never require orchestrator edits.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::types::{RawPrice, Symbol};

/// One batch of ticks from an exchange, keyed by exchange symbol.
pub type TickBatch = HashMap<Symbol, RawPrice>;

/// Live connector to one exchange.
#[async_trait]
pub trait Source: Send {
    /// Waits for the next batch of ticks. Returns `None` once the feed has
    /// ended (e.g. the connector disconnected); that is not fatal to the
    /// consumer, which keeps serving cached prices until closed.
    async fn recv(&mut self) -> Option<TickBatch>;

    /// Releases the transport and unblocks any pending `recv`. Idempotent.
    async fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("unknown price source: {0}")]
    UnknownSource(String),
}

/// Constructor for a source, given the symbols it should subscribe to.
pub type SourceFactory = Box<dyn Fn(&[Symbol]) -> Box<dyn Source> + Send + Sync>;

/// Registration table mapping exchange names to connector constructors.
#[derive(Default)]
pub struct SourceRegistry {
    factories: HashMap<String, SourceFactory>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connector constructor under `name`, replacing any
    /// previous registration for the same exchange.
    pub fn register(&mut self, name: impl Into<String>, factory: SourceFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Builds a source for `name` subscribed to `symbols`.
    pub fn build(&self, name: &str, symbols: &[Symbol]) -> Result<Box<dyn Source>, SourceError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SourceError::UnknownSource(name.to_string()))?;
        Ok(factory(symbols))
    }
}

/// Source fed by an mpsc channel of tick batches.
///
/// External connectors own the transport and push parsed batches through the
/// sender half; dropping the sender ends the feed without error.
pub struct ChannelSource {
    rx: mpsc::Receiver<TickBatch>,
}

impl ChannelSource {
    /// Returns the source and the sender half connectors push batches into.
    pub fn new(buffer: usize) -> (Self, mpsc::Sender<TickBatch>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { rx }, tx)
    }
}

#[async_trait]
impl Source for ChannelSource {
    async fn recv(&mut self) -> Option<TickBatch> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        // Drains nothing; just refuses further sends and wakes pending recv.
        self.rx.close();
    }
}
