//! Meta-transaction encoding for the Authereum account
//!
//! Each logical transaction becomes `abi.encode(address to, uint256 value,
//! uint256 gasLimit, bytes data)`; the ordered list of those blobs is the
//! argument of `executeMultipleMetaTransactions(bytes[])`.

use crate::contracts::IAuthereumAccount;
use crate::error::{BridgeError, Result};
use crate::types::LogicalTransaction;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::{SolCall, SolValue};

type MetaTransactionTuple = (Address, U256, U256, Bytes);

/// ABI-encode a single inner meta-transaction
pub fn encode_meta_transaction(tx: &LogicalTransaction) -> Bytes {
    let tuple: MetaTransactionTuple = (tx.to, tx.value, tx.gas_limit, tx.data.clone());
    tuple.abi_encode_params().into()
}

/// Decode a single inner meta-transaction
pub fn decode_meta_transaction(encoded: &[u8]) -> Result<LogicalTransaction> {
    let (to, value, gas_limit, data) =
        MetaTransactionTuple::abi_decode_params(encoded).map_err(BridgeError::encoding)?;
    Ok(LogicalTransaction {
        to,
        value,
        gas_limit,
        data,
    })
}

/// Ordered batch of meta-transactions executed in one account call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaTransactionBatch {
    transactions: Vec<LogicalTransaction>,
}

impl MetaTransactionBatch {
    pub fn new(transactions: Vec<LogicalTransaction>) -> Self {
        Self { transactions }
    }

    /// Batch holding one transaction
    pub fn single(tx: LogicalTransaction) -> Self {
        Self::new(vec![tx])
    }

    pub fn transactions(&self) -> &[LogicalTransaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Calldata for `executeMultipleMetaTransactions` on the account
    pub fn encode(&self) -> Bytes {
        let call = IAuthereumAccount::executeMultipleMetaTransactionsCall {
            transactions: self.transactions.iter().map(encode_meta_transaction).collect(),
        };
        call.abi_encode().into()
    }

    /// Decode account calldata back into its batch
    pub fn decode(calldata: &[u8]) -> Result<Self> {
        let call = IAuthereumAccount::executeMultipleMetaTransactionsCall::abi_decode(calldata)
            .map_err(BridgeError::encoding)?;
        let transactions = call
            .transactions
            .iter()
            .map(|encoded| decode_meta_transaction(encoded))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { transactions })
    }
}

/// Encode one logical transaction as a single-element batch call
pub fn encode(tx: &LogicalTransaction) -> Bytes {
    MetaTransactionBatch::single(tx.clone()).encode()
}

/// Inner transactions of account calldata, in order
pub fn decode_batch(calldata: &[u8]) -> Result<Vec<LogicalTransaction>> {
    MetaTransactionBatch::decode(calldata).map(|batch| batch.transactions)
}
