//! Session connection URI
//!
//! `wc:<topic>@<version>?bridge=<url-encoded relay url>&key=<32-byte hex>`

use crate::constants::SUPPORTED_URI_VERSION;
use crate::error::BridgeError;
use alloy::primitives::B256;
use alloy::transports::http::reqwest::Url;
use std::str::FromStr;

/// Parameters of a session handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUri {
    /// Handshake topic
    pub topic: String,
    /// Protocol version
    pub version: u32,
    /// Relay server
    pub bridge: Url,
    /// Symmetric encryption key
    pub key: B256,
}

impl FromStr for ConnectionUri {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s.trim()).map_err(|e| invalid(s, e))?;
        if url.scheme() != "wc" {
            return Err(invalid(s, "scheme must be wc"));
        }

        let (topic, version) = url
            .path()
            .split_once('@')
            .ok_or_else(|| invalid(s, "missing version"))?;
        if topic.is_empty() {
            return Err(invalid(s, "missing topic"));
        }
        let version: u32 = version.parse().map_err(|e| invalid(s, e))?;
        if version != SUPPORTED_URI_VERSION {
            return Err(invalid(s, format!("unsupported version {version}")));
        }

        let mut bridge = None;
        let mut key = None;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "bridge" => bridge = Some(Url::parse(&value).map_err(|e| invalid(s, e))?),
                "key" => key = Some(B256::from_str(&value).map_err(|e| invalid(s, e))?),
                _ => {}
            }
        }

        Ok(Self {
            topic: topic.to_string(),
            version,
            bridge: bridge.ok_or_else(|| invalid(s, "missing bridge"))?,
            key: key.ok_or_else(|| invalid(s, "missing key"))?,
        })
    }
}

fn invalid(uri: &str, reason: impl std::fmt::Display) -> BridgeError {
    BridgeError::connection(format!("invalid connection URI {uri:?}: {reason}"))
}
