//! Authereum Direct
//!
//! Connects an Authereum smart-contract account to any dapp speaking the
//! WalletConnect session protocol. Call requests from the dapp are held one at
//! a time for the operator; approved transactions are wrapped as
//! meta-transactions and executed through the account with
//! `executeMultipleMetaTransactions(bytes[])`.
//!
//! # Features
//!
//! - Session handshake, approval, resume and disconnect
//! - `eth_sendTransaction` / `eth_signTransaction` through the account
//! - `eth_sign` / `personal_sign` with the account's admin key
//! - Local private key, JSON-RPC wallet or Fordefi MPC signing
//!
//! # Example
//!
//! ```rust,ignore
//! use authereum_direct::{AccountSigner, BridgeConfig, CallBridge, SessionPeer};
//!
//! #[tokio::main]
//! async fn main() -> eyre::Result<()> {
//!     tracing_subscriber::fmt::init();
//!     let config = BridgeConfig::from_env()?;
//!     let signer = BridgeConfig::signer_from_env()?.build().await?;
//!
//!     let peer = SessionPeer::new(transport, config.client_meta.clone());
//!     let bridge = CallBridge::from_config(&config, peer.clone(), signer);
//!     bridge.spawn();
//!
//!     peer.connect("wc:...@1?bridge=...&key=...").await?;
//!
//!     // later, once the operator has reviewed the pending request
//!     let resolution = bridge.approve().await?;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod constants;
pub mod contracts;
pub mod error;
pub mod meta_tx;
pub mod network;
pub mod session;
pub mod signer;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use bridge::{CallBridge, RequestState, Resolution};
pub use config::{BridgeConfig, NetworkContext, SignerConfig};
pub use error::{eyre, BridgeError, Context, Report, Result};
pub use meta_tx::MetaTransactionBatch;
pub use network::{ChainRpc, Network, RpcClient};
pub use session::{
    ConnectionUri, InboundMessage, OutboundMessage, PeerMeta, PersistedSession, Session,
    SessionEvent, SessionPeer, SessionState, SessionTransport,
};
pub use signer::{
    AccountSigner, FordefiWallet, JsonRpcWallet, KeySigner, ProviderSigner, WalletKind,
    WalletProvider,
};
pub use types::{
    CallRequest, LogicalTransaction, OuterTransaction, RequestKind, RpcError, SignedPayload,
    SignedResult,
};
