//! Transport seam between the session peer and the relay

use super::protocol::{InboundMessage, OutboundMessage, PeerMeta, PersistedSession};
use super::uri::ConnectionUri;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Wire-level session connection: relay, encryption and message framing
///
/// Inbound peer messages are delivered on the returned channel; the channel
/// closing means the connection is gone.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Run the handshake for a fresh session
    async fn connect(
        &self,
        uri: &ConnectionUri,
        client_meta: &PeerMeta,
    ) -> eyre::Result<mpsc::Receiver<InboundMessage>>;

    /// Reattach to a previously approved session
    async fn resume(
        &self,
        session: &PersistedSession,
    ) -> eyre::Result<mpsc::Receiver<InboundMessage>>;

    async fn send(&self, message: OutboundMessage) -> eyre::Result<()>;

    async fn close(&self) -> eyre::Result<()>;
}
