//! Local private key signer

use crate::error::{BridgeError, Result};
use crate::types::OuterTransaction;
use alloy::consensus::{SignableTransaction, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, Signature};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use eyre::Context;

/// Signer holding a raw EVM private key
///
/// Signs locally and returns raw transaction bytes; broadcasting is left to
/// the caller.
#[derive(Debug, Clone)]
pub struct KeySigner {
    signer: PrivateKeySigner,
}

impl KeySigner {
    /// Create a new KeySigner from a private key hex string
    ///
    /// # Arguments
    ///
    /// * `private_key` - Hex-encoded private key (with or without 0x prefix)
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let signer = KeySigner::from_private_key("0x...")?;
    /// ```
    pub fn from_private_key(private_key: impl AsRef<str>) -> eyre::Result<Self> {
        let key = private_key.as_ref().trim();
        let key = key.strip_prefix("0x").unwrap_or(key);

        let signer: PrivateKeySigner = key.parse().context("Failed to parse private key")?;

        Ok(Self { signer })
    }

    /// Fresh random key
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// EIP-191 personal-message signature
    pub async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        self.signer
            .sign_message(message)
            .await
            .map_err(BridgeError::signing)
    }

    /// Sign `tx` as an EIP-155 legacy transaction and return its raw encoding
    pub fn sign_transaction(&self, tx: &OuterTransaction) -> Result<Bytes> {
        let mut legacy = tx.to_legacy();
        let signature = self
            .signer
            .sign_transaction_sync(&mut legacy)
            .map_err(BridgeError::signing)?;

        let envelope = TxEnvelope::from(legacy.into_signed(signature));
        tracing::debug!(hash = %envelope.tx_hash(), nonce = tx.nonce, "signed account transaction");

        Ok(envelope.encoded_2718().into())
    }
}
