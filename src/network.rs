//! Chain access for the selected network

use crate::config::NetworkContext;
use crate::error::{BridgeError, Result};
use alloy::network::Ethereum;
use alloy::primitives::{Address, TxHash};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use async_trait::async_trait;
use eyre::Context;
use std::sync::Arc;

/// RPC operations the bridge needs from a node
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Pending-inclusive transaction count of `address`
    async fn transaction_count(&self, address: Address) -> eyre::Result<u64>;

    /// Current gas price in wei
    async fn gas_price(&self) -> eyre::Result<u128>;

    /// Broadcast a signed raw transaction
    async fn send_raw_transaction(&self, raw: &[u8]) -> eyre::Result<TxHash>;
}

/// JSON-RPC node client
pub struct RpcClient {
    provider: RootProvider<Ethereum>,
}

impl RpcClient {
    pub fn new(context: &NetworkContext) -> Self {
        // No fillers: every field of what we broadcast is set explicitly
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .network::<Ethereum>()
            .connect_http(context.rpc_url.clone());

        Self { provider }
    }
}

#[async_trait]
impl ChainRpc for RpcClient {
    async fn transaction_count(&self, address: Address) -> eyre::Result<u64> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .context("Failed to get transaction count")
    }

    async fn gas_price(&self) -> eyre::Result<u128> {
        self.provider
            .get_gas_price()
            .await
            .context("Failed to get gas price")
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> eyre::Result<TxHash> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .context("Failed to send raw transaction")?;

        Ok(*pending.tx_hash())
    }
}

/// Resolved network plus a client for it
#[derive(Clone)]
pub struct Network {
    context: NetworkContext,
    rpc: Arc<dyn ChainRpc>,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Network {
    /// Connect to the context's RPC endpoint
    pub fn connect(context: NetworkContext) -> Self {
        let rpc = Arc::new(RpcClient::new(&context));
        Self { context, rpc }
    }

    /// Use a custom RPC implementation
    pub fn with_rpc(context: NetworkContext, rpc: Arc<dyn ChainRpc>) -> Self {
        Self { context, rpc }
    }

    pub fn context(&self) -> &NetworkContext {
        &self.context
    }

    pub fn chain_id(&self) -> u64 {
        self.context.chain_id
    }

    pub async fn nonce(&self, address: Address) -> Result<u64> {
        self.rpc
            .transaction_count(address)
            .await
            .map_err(BridgeError::network)
    }

    pub async fn gas_price(&self) -> Result<u128> {
        self.rpc.gas_price().await.map_err(BridgeError::network)
    }

    pub async fn broadcast(&self, raw: &[u8]) -> Result<TxHash> {
        let hash = self
            .rpc
            .send_raw_transaction(raw)
            .await
            .map_err(BridgeError::network)?;
        tracing::debug!(%hash, network = %self.context.name, "broadcast raw transaction");
        Ok(hash)
    }
}
