//! Multi-source price aggregation
//!
//! Combines several per-exchange providers behind the single
//! [`PriceProvider`] handle the feeder sees. Queries walk the sources in
//! registration order and take the first valid answer; when no source
//! answers validly the aggregate abstains for the pair. Per-source invalid
//! representations (sentinel, zero, stale value) stay observable on the
//! individual providers.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use crate::provider::sources::{SourceError, SourceRegistry};
use crate::provider::{CachedPriceProvider, PriceProvider};
use crate::types::{AssetPair, Price, Symbol};

/// Ordered fan-out over per-exchange providers.
pub struct AggregatePriceProvider {
    providers: Vec<Box<dyn PriceProvider>>,
}

impl AggregatePriceProvider {
    pub fn new(providers: Vec<Box<dyn PriceProvider>>) -> Self {
        Self { providers }
    }

    /// Builds one [`CachedPriceProvider`] per configured exchange using the
    /// connector registry, then wraps them all. Exchange iteration order is
    /// the sorted exchange name, so query fan-out order is deterministic.
    pub fn from_registry(
        registry: &SourceRegistry,
        exchange_to_symbol_map: &HashMap<String, HashMap<AssetPair, Symbol>>,
    ) -> Result<Self, SourceError> {
        let mut exchanges: Vec<_> = exchange_to_symbol_map.iter().collect();
        exchanges.sort_by(|a, b| a.0.cmp(b.0));

        let mut providers: Vec<Box<dyn PriceProvider>> = Vec::with_capacity(exchanges.len());
        for (exchange, pair_to_symbol) in exchanges {
            let symbols: Vec<Symbol> = pair_to_symbol.values().cloned().collect();
            let source = registry.build(exchange, &symbols)?;
            providers.push(Box::new(CachedPriceProvider::new(
                source,
                exchange.clone(),
                pair_to_symbol.clone(),
            )));
        }
        Ok(Self::new(providers))
    }
}

#[async_trait]
impl PriceProvider for AggregatePriceProvider {
    fn get_price(&self, pair: &AssetPair) -> Price {
        for provider in &self.providers {
            let price = provider.get_price(pair);
            if price.valid {
                return price;
            }
        }
        debug!(pair = %pair, "no valid price on any source");
        Price::abstain(pair.clone(), "aggregate")
    }

    async fn close(&mut self) {
        for provider in &mut self.providers {
            provider.close().await;
        }
    }
}
