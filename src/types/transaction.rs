//! Transactions built by the bridge

use alloy::consensus::TxLegacy;
use alloy::hex;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, Signature, TxHash, TxKind, U256};
use alloy::rpc::types::TransactionRequest;
use serde_json::Value;

/// Normalized view of a transaction request: one inner meta-transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalTransaction {
    /// Destination of the inner call
    pub to: Address,
    /// Value in wei forwarded by the account
    pub value: U256,
    /// Gas forwarded to the inner call
    pub gas_limit: U256,
    /// Inner calldata
    pub data: Bytes,
}

/// The transaction submitted on chain: a call into the smart-contract account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterTransaction {
    /// Smart-contract account address
    pub to: Address,
    /// Always zero; value travels inside the meta-transactions
    pub value: U256,
    /// Encoded `executeMultipleMetaTransactions` call
    pub data: Bytes,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub nonce: u64,
    pub chain_id: u64,
}

impl OuterTransaction {
    /// Legacy (EIP-155) transaction for local signing
    pub fn to_legacy(&self) -> TxLegacy {
        TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            to: TxKind::Call(self.to),
            value: self.value,
            input: self.data.clone(),
        }
    }

    /// JSON-RPC transaction request sent from `from`, for wallets that sign and broadcast
    pub fn to_request(&self, from: Address) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(from)
            .with_to(self.to)
            .with_value(self.value)
            .with_input(self.data.clone())
            .with_gas_limit(self.gas_limit)
            .with_gas_price(self.gas_price)
            .with_nonce(self.nonce)
            .with_chain_id(self.chain_id)
    }
}

/// What an approved request produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedPayload {
    /// Hash of the broadcast account transaction
    TransactionHash(TxHash),
    /// 65-byte `r || s || v` message signature
    Signature(Signature),
}

impl SignedPayload {
    /// JSON-RPC `result` value
    pub fn to_json(&self) -> Value {
        match self {
            Self::TransactionHash(hash) => Value::String(hex::encode_prefixed(hash)),
            Self::Signature(signature) => {
                Value::String(hex::encode_prefixed(signature.as_bytes()))
            }
        }
    }
}

/// Result of an approved request, tagged with the originating request id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedResult {
    pub id: u64,
    pub payload: SignedPayload,
}
