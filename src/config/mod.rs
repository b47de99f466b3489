//! Startup configuration for the price feeder
//!
//! Loads from environment variables (with optional `.env`): chain id, gRPC
//! and websocket endpoints, the feeder mnemonic, and the per-exchange JSON
//! mapping of chain asset pairs to exchange symbols. Every field is
//! mandatory; malformed JSON or pair syntax is a fatal startup error.

use anyhow::{bail, Context, Result};
use config::Environment;
use serde::Deserialize;
use std::collections::HashMap;

use crate::types::{AssetPair, Symbol};

/// Environment shape before the symbol map is parsed.
#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    chain_id: String,
    grpc_endpoint: String,
    websocket_endpoint: String,
    feeder_mnemonic: String,
    /// JSON string: exchange -> { "base:quote" -> exchange symbol }
    exchange_symbols_map: String,
}

/// Validated feeder configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub chain_id: String,
    pub grpc_endpoint: String,
    pub websocket_endpoint: String,
    pub feeder_mnemonic: String,
    pub exchange_to_symbol_map: HashMap<String, HashMap<AssetPair, Symbol>>,
}

impl Config {
    /// Loads and validates the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        // .env is optional
        dotenvy::dotenv().ok();

        let raw: RawConfig = config::Config::builder()
            .add_source(Environment::default())
            .build()
            .context("failed to read environment")?
            .try_deserialize()
            .context("missing or invalid feeder environment variables")?;

        let exchange_to_symbol_map = parse_exchange_symbols_map(&raw.exchange_symbols_map)
            .context("failed to parse EXCHANGE_SYMBOLS_MAP")?;

        let conf = Self {
            chain_id: raw.chain_id,
            grpc_endpoint: raw.grpc_endpoint,
            websocket_endpoint: raw.websocket_endpoint,
            feeder_mnemonic: raw.feeder_mnemonic,
            exchange_to_symbol_map,
        };
        conf.validate()?;
        Ok(conf)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain_id.is_empty() {
            bail!("no chain id");
        }
        if self.feeder_mnemonic.is_empty() {
            bail!("no feeder mnemonic");
        }
        if self.websocket_endpoint.is_empty() {
            bail!("no websocket endpoint");
        }
        if self.grpc_endpoint.is_empty() {
            bail!("no grpc endpoint");
        }
        Ok(())
    }
}

/// Parses the exchange symbol map JSON into typed pair keys.
pub fn parse_exchange_symbols_map(
    json: &str,
) -> Result<HashMap<String, HashMap<AssetPair, Symbol>>> {
    let raw: HashMap<String, HashMap<String, String>> =
        serde_json::from_str(json).context("invalid json")?;

    let mut out = HashMap::with_capacity(raw.len());
    for (exchange, symbols) in raw {
        let mut mapped = HashMap::with_capacity(symbols.len());
        for (pair, symbol) in symbols {
            let pair: AssetPair = pair
                .parse()
                .with_context(|| format!("exchange '{exchange}'"))?;
            mapped.insert(pair, Symbol::from(symbol));
        }
        out.insert(exchange, mapped);
    }
    Ok(out)
}
