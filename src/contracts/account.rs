//! Authereum account contract bindings

use alloy::sol;

sol! {
    /// Authereum smart-contract account interface
    ///
    /// Each element of `transactions` is `abi.encode(address to, uint256 value,
    /// uint256 gasLimit, bytes data)`.
    interface IAuthereumAccount {
        /// Execute a batch of meta-transactions from an auth key or the account itself
        function executeMultipleMetaTransactions(
            bytes[] memory transactions
        ) external returns (bytes[] memory);
    }
}
