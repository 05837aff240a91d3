//! Local secp256k1 key handling
//!
//! SECURITY: keys are held in alloy's PrivateKeySigner.
//! - Keys are never logged
//! - `Debug` output is redacted
//! - Raw key material only leaves this type as a `SecretString`

use crate::{Error, Result};
use alloy::consensus::TxLegacy;
use alloy::hex;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Signature};
use alloy::signers::local::PrivateKeySigner;
use secrecy::SecretString;

/// A private key together with its derived address
pub struct LocalKey {
    signer: PrivateKeySigner,
    address: Address,
}

impl LocalKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let signer = PrivateKeySigner::random();
        let address = signer.address();
        Self { signer, address }
    }

    /// Parse a hex-encoded private key, with or without a `0x` prefix
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let key_hex = key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| Error::InvalidKey(format!("{}", e)))?;
        let address = signer.address();

        Ok(Self { signer, address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// EIP-55 checksummed address
    pub fn address_string(&self) -> String {
        self.address.to_checksum(None)
    }

    /// Hex encoding of the private key (no `0x` prefix)
    pub fn private_key_hex(&self) -> SecretString {
        SecretString::from(hex::encode(self.signer.to_bytes()))
    }

    /// Sign a legacy transaction in place
    ///
    /// The transaction's `chain_id` is bound into the signature (EIP-155).
    pub fn sign_transaction(&self, tx: &mut TxLegacy) -> Result<Signature> {
        self.signer
            .sign_transaction_sync(tx)
            .map_err(|e| Error::Signing(e.to_string()))
    }
}

impl std::fmt::Debug for LocalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKey")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}
