//! Request and transaction types

pub mod request;
pub mod transaction;

pub use request::{CallRequest, RequestKind, RpcError, SignableMessage, TransactionParams};
pub use transaction::{LogicalTransaction, OuterTransaction, SignedPayload, SignedResult};
