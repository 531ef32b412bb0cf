//! Signer abstraction for the bridge
//!
//! The account's admin key is reached either directly ([`KeySigner`]: a raw
//! private key, signing locally) or through an external wallet
//! ([`ProviderSigner`]: the wallet signs and broadcasts itself). The variant is
//! chosen once when the bridge is configured.

mod fordefi;
mod json_rpc;
mod key;

pub use fordefi::FordefiWallet;
pub use json_rpc::JsonRpcWallet;
pub use key::KeySigner;

use crate::config::SignerConfig;
use crate::error::{BridgeError, Result};
use crate::types::OuterTransaction;
use alloy::primitives::{Address, Signature, TxHash};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Supported signing backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletKind {
    /// Raw private key held by the bridge
    PrivateKey,
    /// EIP-1193 style JSON-RPC wallet (browser extension bridge, hardware
    /// wallet daemon, node-managed account)
    JsonRpc,
    /// Fordefi MPC custodial wallet
    Fordefi,
}

impl WalletKind {
    pub const ALL: [Self; 3] = [Self::PrivateKey, Self::JsonRpc, Self::Fordefi];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrivateKey => "private_key",
            Self::JsonRpc => "json_rpc",
            Self::Fordefi => "fordefi",
        }
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> eyre::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| eyre::eyre!("Unsupported wallet kind: {}", s))
    }
}

/// External wallet that signs messages and signs-and-broadcasts transactions
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn kind(&self) -> WalletKind;

    /// Address of the controlled admin key
    fn address(&self) -> Address;

    /// EIP-191 personal-message signature over `message`
    async fn sign_message(&self, message: &[u8]) -> eyre::Result<Signature>;

    /// Sign and broadcast, returning the transaction hash
    async fn send_transaction(&self, tx: &OuterTransaction) -> eyre::Result<TxHash>;
}

/// Signer backed by an external wallet provider
#[derive(Clone)]
pub struct ProviderSigner {
    provider: Arc<dyn WalletProvider>,
}

impl fmt::Debug for ProviderSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSigner")
            .field("kind", &self.provider.kind())
            .field("address", &self.provider.address())
            .finish()
    }
}

impl ProviderSigner {
    pub fn new(provider: impl WalletProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    pub fn kind(&self) -> WalletKind {
        self.provider.kind()
    }

    pub fn address(&self) -> Address {
        self.provider.address()
    }

    pub async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        self.provider
            .sign_message(message)
            .await
            .map_err(BridgeError::signing)
    }

    pub async fn send_transaction(&self, tx: &OuterTransaction) -> Result<TxHash> {
        self.provider
            .send_transaction(tx)
            .await
            .map_err(BridgeError::signing)
    }
}

/// The active signer of the bridge
#[derive(Debug, Clone)]
pub enum AccountSigner {
    /// Local key; the bridge broadcasts through the network context
    Key(KeySigner),
    /// External wallet; the wallet broadcasts
    Provider(ProviderSigner),
}

impl AccountSigner {
    /// Build the signer described by `config`
    pub async fn from_config(config: &SignerConfig) -> eyre::Result<Self> {
        let signer = match config {
            SignerConfig::PrivateKey { private_key } => {
                Self::Key(KeySigner::from_private_key(private_key)?)
            }
            SignerConfig::JsonRpc { url, address } => {
                Self::Provider(ProviderSigner::new(JsonRpcWallet::connect(url, *address).await?))
            }
            SignerConfig::Fordefi {
                access_token,
                private_key_pem,
                address,
            } => {
                let wallet = match address {
                    Some(address) => {
                        FordefiWallet::new(access_token.clone(), private_key_pem, *address).await?
                    }
                    None => FordefiWallet::discover(access_token.clone(), private_key_pem).await?,
                };
                Self::Provider(ProviderSigner::new(wallet))
            }
        };

        tracing::info!(kind = %signer.kind(), address = %signer.address(), "signer configured");
        Ok(signer)
    }

    pub fn kind(&self) -> WalletKind {
        match self {
            Self::Key(_) => WalletKind::PrivateKey,
            Self::Provider(provider) => provider.kind(),
        }
    }

    pub fn address(&self) -> Address {
        match self {
            Self::Key(key) => key.address(),
            Self::Provider(provider) => provider.address(),
        }
    }

    pub async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        match self {
            Self::Key(key) => key.sign_message(message).await,
            Self::Provider(provider) => provider.sign_message(message).await,
        }
    }
}

impl From<KeySigner> for AccountSigner {
    fn from(signer: KeySigner) -> Self {
        Self::Key(signer)
    }
}

impl From<ProviderSigner> for AccountSigner {
    fn from(signer: ProviderSigner) -> Self {
        Self::Provider(signer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedWallet;

    #[test]
    fn test_wallet_kind_parse() {
        assert_eq!("private_key".parse::<WalletKind>().unwrap(), WalletKind::PrivateKey);
        assert_eq!("FORDEFI".parse::<WalletKind>().unwrap(), WalletKind::Fordefi);
        assert_eq!(WalletKind::JsonRpc.to_string(), "json_rpc");
        assert!("ledger".parse::<WalletKind>().is_err());
    }

    #[tokio::test]
    async fn test_provider_errors_become_signing_errors() {
        let signer = AccountSigner::from(ProviderSigner::new(
            ScriptedWallet::random().failing("wallet is locked"),
        ));

        let err = signer.sign_message(b"hello").await.unwrap_err();
        assert_eq!(err, BridgeError::Signing("wallet is locked".to_string()));
    }

    #[tokio::test]
    async fn test_variants_sign_identically() {
        let key = KeySigner::random();
        let wallet = ScriptedWallet::from_key(key.clone());

        let by_key = AccountSigner::from(key).sign_message(b"hello").await.unwrap();
        let by_provider = AccountSigner::from(ProviderSigner::new(wallet))
            .sign_message(b"hello")
            .await
            .unwrap();

        assert_eq!(by_key, by_provider);
    }

    #[tokio::test]
    async fn test_from_config_private_key() {
        let config = SignerConfig::PrivateKey {
            private_key: "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
                .to_string(),
        };
        let signer = AccountSigner::from_config(&config).await.unwrap();
        assert_eq!(signer.kind(), WalletKind::PrivateKey);
        assert_eq!(config.kind(), WalletKind::PrivateKey);
    }
}
