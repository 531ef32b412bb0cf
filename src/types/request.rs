//! Call requests received from the peer

use crate::constants::{methods, META_TX_GAS_LIMIT, REJECTION_ERROR_CODE};
use crate::error::{BridgeError, Result};
use crate::types::LogicalTransaction;
use alloy::hex;
use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// How a call request is serviced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// `eth_signTransaction`; serviced like a send, the reply is the hash
    SignTransaction,
    /// `eth_sendTransaction`
    SendTransaction,
    /// `eth_sign` / `personal_sign`
    SignMessage,
    /// Anything else; always rejected
    Unsupported,
}

impl RequestKind {
    pub fn from_method(method: &str) -> Self {
        match method {
            methods::ETH_SIGN_TRANSACTION => Self::SignTransaction,
            methods::ETH_SEND_TRANSACTION => Self::SendTransaction,
            methods::ETH_SIGN | methods::PERSONAL_SIGN => Self::SignMessage,
            _ => Self::Unsupported,
        }
    }

    pub fn is_transaction(self) -> bool {
        matches!(self, Self::SignTransaction | Self::SendTransaction)
    }
}

/// One signing or transaction request from the peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    /// JSON-RPC id, echoed in the reply
    pub id: u64,
    /// JSON-RPC method name
    pub method: String,
    /// Ordered positional parameters
    #[serde(default)]
    pub params: Vec<Value>,
    /// Error already attached to the request upstream
    #[serde(
        default,
        deserialize_with = "deserialize_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Error with the generic rejection code
    pub fn rejection(message: impl Into<String>) -> Self {
        Self::new(REJECTION_ERROR_CODE, message)
    }
}

impl CallRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            error: None,
        }
    }

    /// Attach an upstream error
    pub fn with_error(mut self, error: RpcError) -> Self {
        self.error = Some(error);
        self
    }

    /// Parse a raw JSON-RPC request payload
    pub fn from_payload(payload: Value) -> Result<Self> {
        serde_json::from_value(payload).map_err(BridgeError::protocol)
    }

    pub fn kind(&self) -> RequestKind {
        RequestKind::from_method(&self.method)
    }

    /// Pretty-printed JSON, the editable representation of the request
    pub fn raw_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Transaction parameters (`params[0]`) of a transaction request
    pub fn transaction_params(&self) -> Result<TransactionParams> {
        let first = self
            .params
            .first()
            .ok_or_else(|| BridgeError::Encoding("missing transaction parameters".into()))?;
        serde_json::from_value(first.clone()).map_err(BridgeError::encoding)
    }

    /// Payload of a message-signing request.
    ///
    /// `eth_sign` carries `[address, data]` (a lone `[data]` is accepted too);
    /// `personal_sign` carries `[data, address]`.
    pub fn message(&self) -> Result<SignableMessage> {
        let data = match (self.method.as_str(), self.params.as_slice()) {
            (methods::ETH_SIGN, [first, second, ..]) if is_address(first) => second,
            (_, [first, ..]) => first,
            (_, []) => return Err(BridgeError::Encoding("missing message parameter".into())),
        };
        SignableMessage::from_param(data)
    }

    /// Apply an operator edit given as JSON.
    ///
    /// Accepts a complete request object with the same id, or a bare params
    /// array. The result must still be serviceable.
    pub fn edited(&self, raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).map_err(BridgeError::encoding)?;
        let updated = match value {
            Value::Array(params) => Self {
                params,
                ..self.clone()
            },
            Value::Object(_) => {
                let updated: Self = serde_json::from_value(value).map_err(BridgeError::encoding)?;
                if updated.id != self.id {
                    return Err(BridgeError::Encoding(format!(
                        "request id cannot change ({} -> {})",
                        self.id, updated.id
                    )));
                }
                updated
            }
            _ => {
                return Err(BridgeError::Encoding(
                    "expected a request object or a params array".into(),
                ))
            }
        };
        updated.validate()?;
        Ok(updated)
    }

    /// Structural check that the request can be serviced
    pub fn validate(&self) -> Result<()> {
        match self.kind() {
            kind if kind.is_transaction() => {
                let params = self.transaction_params()?;
                params.to_logical()?;
                params.gas_price()?;
            }
            RequestKind::SignMessage => {
                self.message()?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn is_address(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.len() == 42 && s.parse::<Address>().is_ok())
}

fn deserialize_error<'de, D>(deserializer: D) -> std::result::Result<Option<RpcError>, D::Error>
where
    D: Deserializer<'de>,
{
    // Upstream errors arrive either as a bare string or as `{ code, message }`
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(message)) => Some(RpcError::rejection(message)),
        Some(Value::Object(map)) => {
            let code = map.get("code").and_then(Value::as_i64);
            let message = map.get("message").and_then(Value::as_str).map(str::to_string);
            let message = message.unwrap_or_else(|| Value::Object(map).to_string());
            Some(RpcError::new(code.unwrap_or(REJECTION_ERROR_CODE), message))
        }
        Some(other) => Some(RpcError::rejection(other.to_string())),
    })
}

/// Transaction object of `eth_sendTransaction` / `eth_signTransaction`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Value>,
}

impl TransactionParams {
    /// Normalize into the inner meta-transaction.
    ///
    /// The peer's own gas field is ignored: every meta-transaction gets
    /// [`META_TX_GAS_LIMIT`].
    pub fn to_logical(&self) -> Result<LogicalTransaction> {
        let to = match &self.to {
            Some(Value::String(to)) => to
                .trim()
                .parse::<Address>()
                .map_err(|e| BridgeError::Encoding(format!("invalid `to` address: {e}")))?,
            Some(other) => {
                return Err(BridgeError::Encoding(format!(
                    "invalid `to` address: {other}"
                )))
            }
            None => return Err(BridgeError::Encoding("transaction is missing `to`".into())),
        };
        let value = parse_quantity("value", self.value.as_ref())?;
        let data = parse_data("data", self.data.as_ref().or(self.input.as_ref()))?;

        Ok(LogicalTransaction {
            to,
            value,
            gas_limit: U256::from(META_TX_GAS_LIMIT),
            data,
        })
    }

    /// Gas price supplied by the peer, if any
    pub fn gas_price(&self) -> Result<Option<u128>> {
        match &self.gas_price {
            None | Some(Value::Null) => Ok(None),
            Some(value) => {
                let price = parse_quantity("gasPrice", Some(value))?;
                let price = u128::try_from(price)
                    .map_err(|_| BridgeError::Encoding("`gasPrice` out of range".into()))?;
                Ok(Some(price))
            }
        }
    }
}

/// Parse a JSON-RPC quantity: `0x`-hex string, decimal string or number.
/// Missing and `"0x"` read as zero.
fn parse_quantity(field: &str, value: Option<&Value>) -> Result<U256> {
    let invalid = |detail: String| BridgeError::Encoding(format!("invalid `{field}`: {detail}"));

    match value {
        None | Some(Value::Null) => Ok(U256::ZERO),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| invalid(n.to_string())),
        Some(Value::String(s)) => {
            let s = s.trim();
            let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some("") => Ok(U256::ZERO),
                Some(digits) => U256::from_str_radix(digits, 16),
                None if s.is_empty() => Ok(U256::ZERO),
                None => U256::from_str_radix(s, 10),
            };
            parsed.map_err(|e| invalid(format!("{s} ({e})")))
        }
        Some(other) => Err(invalid(other.to_string())),
    }
}

/// Parse hex calldata; missing and `"0x"` read as empty
fn parse_data(field: &str, value: Option<&Value>) -> Result<Bytes> {
    match value {
        None | Some(Value::Null) => Ok(Bytes::new()),
        Some(Value::String(s)) => hex::decode(s.trim())
            .map(Bytes::from)
            .map_err(|e| BridgeError::Encoding(format!("invalid `{field}` hex: {e}"))),
        Some(other) => Err(BridgeError::Encoding(format!(
            "invalid `{field}`: {other}"
        ))),
    }
}

/// Message bytes to be signed with EIP-191 personal-message prefixing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignableMessage(Bytes);

impl SignableMessage {
    /// Decode a message parameter.
    ///
    /// `0x`-prefixed values are hex-decoded; anything else is taken as literal text.
    pub fn from_param(value: &Value) -> Result<Self> {
        let s = value
            .as_str()
            .ok_or_else(|| BridgeError::Encoding(format!("message must be a string: {value}")))?;

        if s.starts_with("0x") {
            let bytes = hex::decode(s)
                .map_err(|e| BridgeError::Encoding(format!("invalid message hex: {e}")))?;
            Ok(Self(bytes.into()))
        } else {
            Ok(Self(Bytes::copy_from_slice(s.as_bytes())))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Human-readable form of the message
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TO: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[test]
    fn test_request_kind() {
        assert_eq!(
            RequestKind::from_method("eth_sendTransaction"),
            RequestKind::SendTransaction
        );
        assert_eq!(
            RequestKind::from_method("eth_signTransaction"),
            RequestKind::SignTransaction
        );
        assert_eq!(RequestKind::from_method("personal_sign"), RequestKind::SignMessage);
        assert_eq!(RequestKind::from_method("eth_sign"), RequestKind::SignMessage);
        assert_eq!(
            RequestKind::from_method("eth_signTypedData_v4"),
            RequestKind::Unsupported
        );
    }

    #[test]
    fn test_from_payload_with_error_object() {
        let request = CallRequest::from_payload(json!({
            "id": 7,
            "jsonrpc": "2.0",
            "method": "eth_sendTransaction",
            "params": [],
            "error": { "code": -32000, "message": "gas too low" }
        }))
        .unwrap();

        assert_eq!(request.id, 7);
        assert_eq!(request.error, Some(RpcError::new(-32000, "gas too low")));
    }

    #[test]
    fn test_from_payload_keeps_upstream_error_code() {
        let request = CallRequest::from_payload(json!({
            "id": 5,
            "method": "eth_sendTransaction",
            "params": [],
            "error": { "code": 4001, "message": "User rejected the request" }
        }))
        .unwrap();
        assert_eq!(
            request.error,
            Some(RpcError::new(4001, "User rejected the request"))
        );

        let bare = CallRequest::from_payload(json!({
            "id": 6,
            "method": "eth_sendTransaction",
            "error": "nonce too low"
        }))
        .unwrap();
        assert_eq!(bare.error, Some(RpcError::rejection("nonce too low")));
    }

    #[test]
    fn test_from_payload_rejects_missing_method() {
        let err = CallRequest::from_payload(json!({ "id": 1, "params": [] })).unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
    }

    #[test]
    fn test_to_logical() {
        let request = CallRequest::new(
            1,
            "eth_sendTransaction",
            vec![json!({ "to": TO, "value": "0x0", "data": "0x1234", "gas": "0x5208" })],
        );
        let tx = request.transaction_params().unwrap().to_logical().unwrap();

        assert_eq!(tx.to, TO.parse::<Address>().unwrap());
        assert_eq!(tx.value, U256::ZERO);
        assert_eq!(tx.gas_limit, U256::from(META_TX_GAS_LIMIT));
        assert_eq!(tx.data, Bytes::from(vec![0x12, 0x34]));
    }

    #[test]
    fn test_to_logical_defaults_and_input_alias() {
        let params: TransactionParams =
            serde_json::from_value(json!({ "to": TO, "value": "0x", "input": "0xab" })).unwrap();
        let tx = params.to_logical().unwrap();
        assert_eq!(tx.value, U256::ZERO);
        assert_eq!(tx.data, Bytes::from(vec![0xab]));

        let params: TransactionParams =
            serde_json::from_value(json!({ "to": TO, "value": "1000" })).unwrap();
        assert_eq!(params.to_logical().unwrap().value, U256::from(1000u64));
    }

    #[test]
    fn test_to_logical_errors() {
        let missing_to: TransactionParams = serde_json::from_value(json!({ "value": "0x1" })).unwrap();
        assert!(matches!(missing_to.to_logical(), Err(BridgeError::Encoding(_))));

        let bad_data: TransactionParams =
            serde_json::from_value(json!({ "to": TO, "data": "0xzz" })).unwrap();
        assert!(matches!(bad_data.to_logical(), Err(BridgeError::Encoding(_))));

        let not_object = CallRequest::new(1, "eth_sendTransaction", vec![json!("0x1234")]);
        assert!(matches!(not_object.transaction_params(), Err(BridgeError::Encoding(_))));
    }

    #[test]
    fn test_gas_price() {
        let params: TransactionParams =
            serde_json::from_value(json!({ "to": TO, "gasPrice": "0x3b9aca00" })).unwrap();
        assert_eq!(params.gas_price().unwrap(), Some(1_000_000_000));

        let params: TransactionParams = serde_json::from_value(json!({ "to": TO })).unwrap();
        assert_eq!(params.gas_price().unwrap(), None);
    }

    #[test]
    fn test_message_param_selection() {
        let eth_sign = CallRequest::new(1, "eth_sign", vec![json!("0x68656c6c6f")]);
        assert_eq!(eth_sign.message().unwrap().text(), "hello");

        let eth_sign_pair = CallRequest::new(1, "eth_sign", vec![json!(TO), json!("0x68656c6c6f")]);
        assert_eq!(eth_sign_pair.message().unwrap().text(), "hello");

        let personal = CallRequest::new(1, "personal_sign", vec![json!("0x68656c6c6f"), json!(TO)]);
        assert_eq!(personal.message().unwrap().text(), "hello");

        let literal = CallRequest::new(1, "personal_sign", vec![json!("plain text")]);
        assert_eq!(literal.message().unwrap().as_bytes(), b"plain text");

        let empty = CallRequest::new(1, "personal_sign", vec![]);
        assert!(matches!(empty.message(), Err(BridgeError::Encoding(_))));
    }

    #[test]
    fn test_edited() {
        let request = CallRequest::new(3, "eth_sendTransaction", vec![json!({ "to": TO })]);

        let params_only = request
            .edited(&json!([{ "to": TO, "value": "0x10" }]).to_string())
            .unwrap();
        assert_eq!(params_only.id, 3);
        assert_eq!(params_only.params[0]["value"], "0x10");

        let full = request
            .edited(
                &json!({ "id": 3, "method": "eth_sendTransaction", "params": [{ "to": TO, "data": "0x01" }] })
                    .to_string(),
            )
            .unwrap();
        assert_eq!(full.params[0]["data"], "0x01");

        assert!(request.edited("{ not json").is_err());
        assert!(request
            .edited(&json!({ "id": 4, "method": "eth_sendTransaction", "params": [] }).to_string())
            .is_err());
        assert!(request.edited(&json!([{ "value": "0x1" }]).to_string()).is_err());
    }

    #[test]
    fn test_raw_json_round_trip() {
        let request = CallRequest::new(9, "personal_sign", vec![json!("0x00")])
            .with_error(RpcError::new(4001, "boom"));
        let parsed: CallRequest = serde_json::from_str(&request.raw_json()).unwrap();
        assert_eq!(parsed, request);
    }
}
