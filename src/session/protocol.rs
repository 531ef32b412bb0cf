//! Session protocol messages and state

use super::uri::ConnectionUri;
use crate::types::CallRequest;
use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::types::RpcError;

/// Descriptive metadata of one side of a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub icons: Vec<String>,
}

impl PeerMeta {
    /// Metadata this bridge presents during the handshake
    pub fn default_client() -> Self {
        Self {
            name: "Authereum Direct".to_string(),
            description: "Use your Authereum account with any dapp".to_string(),
            url: "https://authereum.com".to_string(),
            icons: vec!["https://authereum.com/favicon.png".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake done, waiting for the operator to approve the peer
    PendingApproval,
    /// Approved; call requests are accepted
    Active,
}

/// Snapshot of the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub uri: ConnectionUri,
    pub state: SessionState,
    pub peer_id: Option<String>,
    pub peer_meta: Option<PeerMeta>,
    pub accounts: Vec<Address>,
    pub chain_id: Option<u64>,
}

impl Session {
    pub(crate) fn pending(uri: ConnectionUri) -> Self {
        Self {
            uri,
            state: SessionState::PendingApproval,
            peer_id: None,
            peer_meta: None,
            accounts: Vec::new(),
            chain_id: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}

/// Session data kept between runs so an approved session can be resumed
/// without a new handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub connected: bool,
    pub accounts: Vec<Address>,
    pub chain_id: u64,
    pub bridge: String,
    pub key: B256,
    pub handshake_topic: String,
    #[serde(default)]
    pub client_meta: Option<PeerMeta>,
    #[serde(default)]
    pub peer_id: Option<String>,
    #[serde(default)]
    pub peer_meta: Option<PeerMeta>,
}

/// Decoded message from the peer, delivered by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// The peer asks to open a session
    SessionRequest {
        peer_id: String,
        peer_meta: PeerMeta,
        chain_id: Option<u64>,
    },
    /// Raw JSON-RPC call payload
    CallRequest(Value),
    /// The peer updated or killed the session
    SessionUpdate { approved: bool },
    /// Transport-level error report
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub approved: bool,
    #[serde(default)]
    pub accounts: Vec<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallApproval {
    pub id: u64,
    pub jsonrpc: String,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRejection {
    pub id: u64,
    pub jsonrpc: String,
    pub error: RpcError,
}

/// Message sent to the peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    CallApproval(CallApproval),
    CallRejection(CallRejection),
    SessionUpdate(SessionUpdate),
}

impl OutboundMessage {
    pub fn approve_session(accounts: Vec<Address>, chain_id: u64) -> Self {
        Self::SessionUpdate(SessionUpdate {
            approved: true,
            accounts,
            chain_id: Some(chain_id),
        })
    }

    pub fn kill_session() -> Self {
        Self::SessionUpdate(SessionUpdate {
            approved: false,
            accounts: Vec::new(),
            chain_id: None,
        })
    }

    pub fn approve_call(id: u64, result: Value) -> Self {
        Self::CallApproval(CallApproval {
            id,
            jsonrpc: "2.0".to_string(),
            result,
        })
    }

    pub fn reject_call(id: u64, message: impl Into<String>) -> Self {
        Self::reject_call_with(id, RpcError::rejection(message))
    }

    /// Reject with an existing error object, code included
    pub fn reject_call_with(id: u64, error: RpcError) -> Self {
        Self::CallRejection(CallRejection {
            id,
            jsonrpc: "2.0".to_string(),
            error,
        })
    }

    /// Request id this message answers, if any
    pub fn call_id(&self) -> Option<u64> {
        match self {
            Self::CallApproval(approval) => Some(approval.id),
            Self::CallRejection(rejection) => Some(rejection.id),
            Self::SessionUpdate(_) => None,
        }
    }
}

/// Notification emitted by the session peer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    SessionRequested(PeerMeta),
    CallRequested(CallRequest),
    Disconnected,
    Error(String),
}
