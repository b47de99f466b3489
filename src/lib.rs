//! Price Feeder Library
//!
//! Oracle price-feeder core: subscribes to governance events, caches live
//! exchange ticks per source, assembles one ordered vote list per voting
//! period and hands it to a transaction poster backed by a single-key
//! signing identity. Concrete exchange connectors, the chain RPC transport
//! and the transaction wire format plug in through the traits exposed here.

pub mod config;
pub mod feeder;
pub mod keyring;
pub mod provider;
pub mod telemetry;
pub mod types;
