//! External wallet reached over EIP-1193 style JSON-RPC

use super::{WalletKind, WalletProvider};
use crate::types::OuterTransaction;
use alloy::hex;
use alloy::network::Ethereum;
use alloy::primitives::{Address, Signature, TxHash};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use eyre::{Context, Result};

/// Wallet that owns the admin key and exposes `personal_sign` and
/// `eth_sendTransaction`
pub struct JsonRpcWallet {
    provider: RootProvider<Ethereum>,
    address: Address,
}

impl JsonRpcWallet {
    /// Connect to the wallet endpoint.
    ///
    /// With no explicit `address` the first account the wallet exposes is used.
    pub async fn connect(url: &str, address: Option<Address>) -> Result<Self> {
        let url: Url = url.parse().context("Invalid wallet RPC URL")?;
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .network::<Ethereum>()
            .connect_http(url);

        let accounts = provider
            .get_accounts()
            .await
            .context("Failed to list wallet accounts")?;

        let address = match address {
            Some(address) if accounts.contains(&address) => address,
            Some(address) => eyre::bail!("Wallet does not control {}", address),
            None => *accounts
                .first()
                .ok_or_else(|| eyre::eyre!("Wallet exposes no accounts"))?,
        };

        tracing::info!(%address, "connected JSON-RPC wallet");
        Ok(Self { provider, address })
    }
}

#[async_trait]
impl WalletProvider for JsonRpcWallet {
    fn kind(&self) -> WalletKind {
        WalletKind::JsonRpc
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        let signature: String = self
            .provider
            .raw_request(
                "personal_sign".into(),
                (hex::encode_prefixed(message), self.address),
            )
            .await
            .context("Wallet refused personal_sign")?;

        signature
            .parse()
            .context("Wallet returned a malformed signature")
    }

    async fn send_transaction(&self, tx: &OuterTransaction) -> Result<TxHash> {
        let pending = self
            .provider
            .send_transaction(tx.to_request(self.address))
            .await
            .context("Wallet refused eth_sendTransaction")?;

        Ok(*pending.tx_hash())
    }
}
