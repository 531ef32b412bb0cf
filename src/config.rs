//! Bridge configuration and network resolution

use crate::constants::{
    chain_id_for, DEFAULT_CALL_TIMEOUT, DEFAULT_NETWORK, DEFAULT_RPC_URL_TEMPLATE,
};
use crate::session::PeerMeta;
use crate::signer::{AccountSigner, WalletKind};
use alloy::primitives::Address;
use alloy::transports::http::reqwest::Url;
use eyre::{Context, Result};
use std::time::Duration;

/// Resolved chain identifier and RPC endpoint for the selected network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    /// Network name (e.g. "mainnet", "kovan")
    pub name: String,
    /// Chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: Url,
}

impl NetworkContext {
    /// Resolve a known network name against an endpoint template.
    ///
    /// `{network}` in the template is replaced with the network name.
    pub fn resolve(name: &str, rpc_url_template: &str) -> Result<Self> {
        let name = name.trim().to_lowercase();
        let chain_id =
            chain_id_for(&name).ok_or_else(|| eyre::eyre!("Unknown network: {}", name))?;
        let rpc_url = rpc_url_template
            .replace("{network}", &name)
            .parse()
            .context("Invalid RPC URL")?;

        Ok(Self {
            name,
            chain_id,
            rpc_url,
        })
    }

    /// Mainnet via the default endpoint template
    pub fn mainnet() -> Result<Self> {
        Self::resolve(DEFAULT_NETWORK, DEFAULT_RPC_URL_TEMPLATE)
    }
}

/// Settings for the external signing backend
#[derive(Debug, Clone)]
pub enum SignerConfig {
    /// Raw private key, hex with or without 0x prefix
    PrivateKey { private_key: String },
    /// EIP-1193 style JSON-RPC wallet endpoint
    JsonRpc {
        url: String,
        /// Account to use; the first exposed account when `None`
        address: Option<Address>,
    },
    /// Fordefi MPC wallet
    Fordefi {
        access_token: String,
        private_key_pem: String,
        /// Vault address; the first EVM vault is discovered when `None`
        address: Option<Address>,
    },
}

impl SignerConfig {
    pub fn kind(&self) -> WalletKind {
        match self {
            Self::PrivateKey { .. } => WalletKind::PrivateKey,
            Self::JsonRpc { .. } => WalletKind::JsonRpc,
            Self::Fordefi { .. } => WalletKind::Fordefi,
        }
    }

    /// Construct the signer these settings describe
    pub async fn build(&self) -> Result<AccountSigner> {
        AccountSigner::from_config(self).await
    }

    /// Load the signer settings for `kind` from the environment
    pub fn from_env(kind: WalletKind) -> Result<Self> {
        match kind {
            WalletKind::PrivateKey => Ok(Self::PrivateKey {
                private_key: required_env("PRIVATE_KEY")?,
            }),
            WalletKind::JsonRpc => Ok(Self::JsonRpc {
                url: required_env("WALLET_RPC_URL")?,
                address: optional_env("WALLET_ADDRESS")
                    .map(|a| a.parse().context("Invalid WALLET_ADDRESS"))
                    .transpose()?,
            }),
            WalletKind::Fordefi => Ok(Self::Fordefi {
                access_token: required_env("FORDEFI_ACCESS_TOKEN")?,
                private_key_pem: required_env("FORDEFI_PRIVATE_KEY")?,
                address: optional_env("FORDEFI_ADDRESS")
                    .map(|a| a.parse().context("Invalid FORDEFI_ADDRESS"))
                    .transpose()?,
            }),
        }
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Network the bridge operates on
    pub network: NetworkContext,
    /// Endpoint template used when switching networks
    pub rpc_url_template: String,
    /// The Authereum smart-contract account executing meta-transactions
    pub account: Address,
    /// Upper bound for signer and network calls per request
    pub call_timeout: Duration,
    /// Metadata we present to peers during the handshake
    pub client_meta: PeerMeta,
}

impl BridgeConfig {
    /// Create a configuration for `account` on mainnet
    pub fn new(account: Address) -> Result<Self> {
        Ok(Self {
            network: NetworkContext::mainnet()?,
            rpc_url_template: DEFAULT_RPC_URL_TEMPLATE.to_string(),
            account,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            client_meta: PeerMeta::default_client(),
        })
    }

    /// Load configuration from `AUTHEREUM_*` environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let account: Address = required_env("AUTHEREUM_ACCOUNT_ADDRESS")?
            .parse()
            .context("Invalid AUTHEREUM_ACCOUNT_ADDRESS")?;
        let template = optional_env("AUTHEREUM_RPC_URL_TEMPLATE")
            .unwrap_or_else(|| DEFAULT_RPC_URL_TEMPLATE.to_string());
        let network_name =
            optional_env("AUTHEREUM_NETWORK").unwrap_or_else(|| DEFAULT_NETWORK.to_string());
        let call_timeout = match optional_env("AUTHEREUM_CALL_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .context("Invalid AUTHEREUM_CALL_TIMEOUT_SECS")?,
            ),
            None => DEFAULT_CALL_TIMEOUT,
        };

        Ok(Self {
            network: NetworkContext::resolve(&network_name, &template)?,
            rpc_url_template: template,
            account,
            call_timeout,
            client_meta: PeerMeta::default_client(),
        })
    }

    /// Signer settings for the backend named by `AUTHEREUM_WALLET`
    /// (default `private_key`)
    pub fn signer_from_env() -> Result<SignerConfig> {
        dotenvy::dotenv().ok();

        let kind = match optional_env("AUTHEREUM_WALLET") {
            Some(kind) => kind.parse()?,
            None => WalletKind::PrivateKey,
        };
        SignerConfig::from_env(kind)
    }

    /// Switch to another known network using the configured template
    pub fn with_network(mut self, name: &str) -> Result<Self> {
        self.network = NetworkContext::resolve(name, &self.rpc_url_template)?;
        Ok(self)
    }

    /// Set the RPC endpoint template and re-resolve the current network
    pub fn with_rpc_url_template(mut self, template: impl Into<String>) -> Result<Self> {
        self.rpc_url_template = template.into();
        self.network = NetworkContext::resolve(&self.network.name, &self.rpc_url_template)?;
        Ok(self)
    }

    /// Set the per-request timeout
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Set the metadata presented to peers
    pub fn with_client_meta(mut self, client_meta: PeerMeta) -> Self {
        self.client_meta = client_meta;
        self
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{} environment variable must be set", key))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
