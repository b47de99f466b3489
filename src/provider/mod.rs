//! Price providers - per-exchange tick caches behind a common query trait
//!
//! A provider wraps one exchange [`Source`], keeps the latest tick per symbol
//! in a single-writer cache, and answers chain asset-pair queries with
//! staleness evaluation. Degraded answers are data, never errors: one bad
//! pair must not block voting on the rest.

pub mod aggregate;
pub mod sources;

pub use aggregate::AggregatePriceProvider;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::types::{AssetPair, Price, RawPrice, Symbol, PRICE_TIMEOUT};
use sources::Source;

/// Answers vote-price queries for chain asset pairs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceProvider: Send {
    /// Resolves `pair` to a [`Price`]. Never fails: unmapped pairs yield the
    /// abstain sentinel, unpriced or stale symbols yield `valid: false`.
    fn get_price(&self, pair: &AssetPair) -> Price;

    /// Stops background work and releases the underlying source. Returns
    /// only once everything has fully shut down; safe to call twice.
    async fn close(&mut self);
}

type PriceCache = Arc<Mutex<HashMap<Symbol, RawPrice>>>;

/// [`PriceProvider`] backed by one [`Source`] and an in-memory tick cache.
///
/// Exactly one background task (the consumer) writes the cache for the
/// provider's whole lifetime; queries only ever read through the lock.
pub struct CachedPriceProvider {
    source_name: String,
    pair_to_symbol: HashMap<AssetPair, Symbol>,
    last_prices: PriceCache,
    staleness: Duration,
    stop: Option<oneshot::Sender<()>>,
    consumer: Option<JoinHandle<()>>,
}

impl CachedPriceProvider {
    /// Starts a provider with the default staleness timeout. Must be called
    /// from within a tokio runtime: the consumer task is spawned here.
    pub fn new(
        source: Box<dyn Source>,
        source_name: impl Into<String>,
        pair_to_symbol: HashMap<AssetPair, Symbol>,
    ) -> Self {
        Self::with_staleness(source, source_name, pair_to_symbol, PRICE_TIMEOUT)
    }

    pub fn with_staleness(
        source: Box<dyn Source>,
        source_name: impl Into<String>,
        pair_to_symbol: HashMap<AssetPair, Symbol>,
        staleness: Duration,
    ) -> Self {
        let source_name = source_name.into();
        let last_prices: PriceCache = Arc::new(Mutex::new(HashMap::new()));
        let (stop_tx, stop_rx) = oneshot::channel();
        let consumer = tokio::spawn(consume_ticks(
            source,
            source_name.clone(),
            Arc::clone(&last_prices),
            stop_rx,
        ));
        Self {
            source_name,
            pair_to_symbol,
            last_prices,
            staleness,
            stop: Some(stop_tx),
            consumer: Some(consumer),
        }
    }
}

#[async_trait]
impl PriceProvider for CachedPriceProvider {
    fn get_price(&self, pair: &AssetPair) -> Price {
        // Unknown pairs can show up after a params update; that is an
        // abstain vote, not an error, and needs no cache access.
        let Some(symbol) = self.pair_to_symbol.get(pair) else {
            warn!(pair = %pair, source = %self.source_name, "no symbol mapping for pair");
            return Price::abstain(pair.clone(), self.source_name.clone());
        };

        let (raw, seen) = {
            let prices = lock_cache(&self.last_prices);
            match prices.get(symbol) {
                Some(raw) => (*raw, true),
                None => (RawPrice::new(0.0, Utc::now()), false),
            }
        };

        Price {
            pair: pair.clone(),
            price: raw.price,
            source_name: self.source_name.clone(),
            valid: seen && is_fresh(&raw, self.staleness),
        }
    }

    async fn close(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        // Wait for the consumer to exit, which includes closing the source.
        if let Some(consumer) = self.consumer.take() {
            let _ = consumer.await;
        }
    }
}

/// Consumer loop: applies tick batches to the cache until stopped, then
/// closes the source exactly once. A feed that ends early leaves the task
/// parked on the stop signal so the close handshake stays intact.
async fn consume_ticks(
    mut source: Box<dyn Source>,
    source_name: String,
    cache: PriceCache,
    mut stop: oneshot::Receiver<()>,
) {
    let mut feed_open = true;
    loop {
        tokio::select! {
            _ = &mut stop => break,
            batch = source.recv(), if feed_open => match batch {
                Some(updates) => {
                    let mut prices = lock_cache(&cache);
                    for (symbol, tick) in updates {
                        prices.insert(symbol, tick);
                    }
                }
                None => {
                    debug!(source = %source_name, "price feed ended");
                    feed_open = false;
                }
            },
        }
    }
    source.close().await;
}

fn is_fresh(raw: &RawPrice, staleness: Duration) -> bool {
    let age_ms = Utc::now()
        .signed_duration_since(raw.updated_at)
        .num_milliseconds();
    age_ms < staleness.as_millis() as i64
}

fn lock_cache(cache: &Mutex<HashMap<Symbol, RawPrice>>) -> MutexGuard<'_, HashMap<Symbol, RawPrice>> {
    // A poisoned cache still holds the last consistent map: the consumer
    // only ever inserts plain values, so recover rather than crash a query.
    match cache.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
