//! Restricted signing identity for vote transactions
//!
//! One mnemonic, one fixed derivation path, one address. The surface is
//! intentionally narrow: lookup-by-address and sign-by-address, nothing
//! else. Broader key-management capabilities (storage, import/export,
//! multisig, hardware wallets) are represented as a typed
//! [`KeyringError::Unsupported`] failure so collaborators that probe for
//! them get a clean error instead of a crash.

use ethers::core::k256::ecdsa::signature::Signer as _;
use ethers::core::k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use ethers::signers::coins_bip39::English;
use ethers::signers::{MnemonicBuilder, Signer as _, Wallet};
use ethers::types::Address;
use thiserror::Error;

/// Fixed BIP-44 path for the feeder key (cosmos coin type).
pub const DERIVATION_PATH: &str = "m/44'/118'/0'/0/0";

#[derive(Debug, Error)]
pub enum KeyringError {
    /// Address-scoped lookup or signing hit an address we do not hold.
    #[error("key not found for address {0:?}")]
    KeyNotFound(Address),
    /// A key-management capability outside the feeder's narrow surface.
    #[error("unsupported keyring operation: {0}")]
    Unsupported(&'static str),
    /// Mnemonic or path could not be turned into a key. Fatal at startup.
    #[error("key derivation failed: {0}")]
    Derivation(String),
}

/// Public half of the identity, returned by address lookup.
#[derive(Debug, Clone, Copy)]
pub struct KeyInfo {
    pub address: Address,
    pub public_key: VerifyingKey,
}

/// Single-key, address-scoped signer for the vote transaction poster.
#[derive(Debug)]
pub struct SigningIdentity {
    address: Address,
    signing_key: SigningKey,
    public_key: VerifyingKey,
}

impl SigningIdentity {
    /// Derives the one feeder key from `mnemonic` at [`DERIVATION_PATH`].
    pub fn from_mnemonic(mnemonic: &str) -> Result<Self, KeyringError> {
        let wallet: Wallet<SigningKey> = MnemonicBuilder::<English>::default()
            .phrase(mnemonic)
            .derivation_path(DERIVATION_PATH)
            .map_err(|e| KeyringError::Derivation(e.to_string()))?
            .build()
            .map_err(|e| KeyringError::Derivation(e.to_string()))?;

        let address = wallet.address();
        let signing_key = wallet.signer().clone();
        let public_key = *signing_key.verifying_key();
        Ok(Self {
            address,
            signing_key,
            public_key,
        })
    }

    /// The single address this identity can act for.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Compressed SEC1 public key, hex encoded, for logs and diagnostics.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.to_sec1_bytes())
    }

    /// Looks up the key material held for `address`.
    pub fn key_by_address(&self, address: Address) -> Result<KeyInfo, KeyringError> {
        if address != self.address {
            return Err(KeyringError::KeyNotFound(address));
        }
        Ok(KeyInfo {
            address: self.address,
            public_key: self.public_key,
        })
    }

    /// Signs `msg` (secp256k1 ECDSA over its SHA-256 digest) if `address`
    /// is the held one.
    pub fn sign_by_address(
        &self,
        address: Address,
        msg: &[u8],
    ) -> Result<(Signature, VerifyingKey), KeyringError> {
        if address != self.address {
            return Err(KeyringError::KeyNotFound(address));
        }
        let signature: Signature = self.signing_key.sign(msg);
        Ok((signature, self.public_key))
    }
}
