//! Constants for the bridge

use std::time::Duration;

/// Gas limit attached to every meta-transaction and to the outer account call.
///
/// This is a fixed ceiling, not an estimate: the account contract forwards at
/// most this much gas to each inner call.
pub const META_TX_GAS_LIMIT: u64 = 300_000;

/// Default network when none is configured
pub const DEFAULT_NETWORK: &str = "mainnet";

/// RPC endpoint template; `{network}` is replaced with the network name
pub const DEFAULT_RPC_URL_TEMPLATE: &str = "https://{network}.rpc.authereum.com";

/// Networks the bridge knows how to resolve, as (name, chain id)
pub const KNOWN_NETWORKS: &[(&str, u64)] = &[
    ("mainnet", 1),
    ("ropsten", 3),
    ("rinkeby", 4),
    ("goerli", 5),
    ("kovan", 42),
];

/// Upper bound for any signer or network call made while servicing a request
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(180);

/// Rejection message used when the operator cancels a request
pub const CANCELLED_MESSAGE: &str = "Cancelled";

/// JSON-RPC error code used for call rejections
pub const REJECTION_ERROR_CODE: i64 = -32000;

/// Protocol version advertised in connection URIs we accept
pub const SUPPORTED_URI_VERSION: u32 = 1;

/// JSON-RPC method names
pub mod methods {
    pub const ETH_SIGN: &str = "eth_sign";
    pub const PERSONAL_SIGN: &str = "personal_sign";
    pub const ETH_SIGN_TRANSACTION: &str = "eth_signTransaction";
    pub const ETH_SEND_TRANSACTION: &str = "eth_sendTransaction";
}

/// Look up the chain id of a known network
pub fn chain_id_for(network: &str) -> Option<u64> {
    KNOWN_NETWORKS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(network))
        .map(|(_, id)| *id)
}
