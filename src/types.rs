//! Core types shared across the price feeder
//!
//! Defines the chain-facing data model: asset pairs, exchange symbols,
//! cached ticks, vote prices and governance parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Maximum tick age after which a cached price is no longer valid for voting.
pub const PRICE_TIMEOUT: Duration = Duration::from_secs(15);

/// Vote price signalling "no valid price available" for an unmapped pair.
pub const ABSTAIN_PRICE: f64 = -1.0;

/// Separator between base and quote in the canonical pair form.
const PAIR_SEPARATOR: char = ':';

/// Chain-side asset pair identifier, e.g. `ubtc:unusd`.
///
/// Immutable once constructed; parsing fails on malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetPair {
    base: String,
    quote: String,
}

impl AssetPair {
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid asset pair '{0}': expected '<base>:<quote>'")]
pub struct InvalidAssetPair(pub String);

impl FromStr for AssetPair {
    type Err = InvalidAssetPair;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once(PAIR_SEPARATOR)
            .ok_or_else(|| InvalidAssetPair(s.to_string()))?;
        if base.is_empty()
            || quote.is_empty()
            || base.contains(char::is_whitespace)
            || quote.contains(char::is_whitespace)
            || quote.contains(PAIR_SEPARATOR)
        {
            return Err(InvalidAssetPair(s.to_string()));
        }
        Ok(Self {
            base: base.to_string(),
            quote: quote.to_string(),
        })
    }
}

impl TryFrom<String> for AssetPair {
    type Error = InvalidAssetPair;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AssetPair> for String {
    fn from(pair: AssetPair) -> Self {
        pair.to_string()
    }
}

impl fmt::Display for AssetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.base, PAIR_SEPARATOR, self.quote)
    }
}

/// Exchange-specific ticker string, opaque outside its source's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol(s)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol(s.to_string())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Latest tick observed for one exchange symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPrice {
    pub price: f64,
    pub updated_at: DateTime<Utc>,
}

impl RawPrice {
    pub fn new(price: f64, updated_at: DateTime<Utc>) -> Self {
        Self { price, updated_at }
    }
}

/// Price answer for one chain pair, computed per query and never stored.
///
/// `valid: false` carries the reason in the price value: `-1.0` means the
/// pair is unmapped on this source, `0.0` means the symbol was never seen,
/// any other value is the last known (possibly stale) tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub pair: AssetPair,
    pub price: f64,
    pub source_name: String,
    pub valid: bool,
}

impl Price {
    /// Abstain answer for a pair with no symbol mapping on `source_name`.
    pub fn abstain(pair: AssetPair, source_name: impl Into<String>) -> Self {
        Self {
            pair,
            price: ABSTAIN_PRICE,
            source_name: source_name.into(),
            valid: false,
        }
    }
}

/// Current governance configuration, replaced wholesale on every update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pub pairs: Vec<AssetPair>,
    pub vote_period_blocks: u64,
}

/// Start-of-voting-period trigger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingPeriod {
    pub height: u64,
}
