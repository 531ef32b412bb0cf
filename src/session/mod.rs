//! Session peer adapter
//!
//! Owns the connection to the remote application. Inbound protocol messages
//! are pumped by a background task and fanned out as [`SessionEvent`]s on a
//! broadcast channel; replies go back through the [`SessionTransport`].

mod protocol;
mod transport;
mod uri;

pub use protocol::{
    CallApproval, CallRejection, InboundMessage, OutboundMessage, PeerMeta, PersistedSession,
    RpcError, Session, SessionEvent, SessionState, SessionUpdate,
};
pub use transport::SessionTransport;
pub use uri::ConnectionUri;

use crate::error::{BridgeError, Result};
use crate::types::CallRequest;
use alloy::primitives::Address;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 64;

/// Connection to one remote peer at a time
#[derive(Clone)]
pub struct SessionPeer {
    inner: Arc<PeerInner>,
}

struct PeerInner {
    transport: Arc<dyn SessionTransport>,
    client_meta: PeerMeta,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
    /// Bumped on every connect, resume and disconnect; a pump only acts while
    /// its generation is current
    generation: AtomicU64,
    pump: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPeer")
            .field("client_meta", &self.inner.client_meta)
            .finish_non_exhaustive()
    }
}

impl SessionPeer {
    pub fn new(transport: Arc<dyn SessionTransport>, client_meta: PeerMeta) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(PeerInner {
                transport,
                client_meta,
                session: RwLock::new(None),
                events,
                generation: AtomicU64::new(0),
                pump: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Attach a new event receiver. Dropping it detaches.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Start a fresh session from a connection URI.
    ///
    /// Any existing session is torn down first. On success the session waits
    /// for [`approve_session`](Self::approve_session).
    pub async fn connect(&self, uri: &str) -> Result<()> {
        let uri: ConnectionUri = uri.parse()?;
        self.disconnect().await;

        let inbound = self
            .inner
            .transport
            .connect(&uri, &self.inner.client_meta)
            .await
            .map_err(BridgeError::connection)?;

        tracing::info!(topic = %uri.topic, bridge = %uri.bridge, "session handshake started");
        *self.inner.session.write().await = Some(Session::pending(uri));
        self.start_pump(inbound);
        Ok(())
    }

    /// Reattach to a stored session without a new handshake
    pub async fn resume(&self, persisted: &PersistedSession) -> Result<()> {
        if !persisted.connected {
            return Err(BridgeError::Connection(
                "stored session was never approved".into(),
            ));
        }
        let uri = ConnectionUri {
            topic: persisted.handshake_topic.clone(),
            version: crate::constants::SUPPORTED_URI_VERSION,
            bridge: persisted.bridge.parse().map_err(BridgeError::connection)?,
            key: persisted.key,
        };
        self.disconnect().await;

        let inbound = self
            .inner
            .transport
            .resume(persisted)
            .await
            .map_err(BridgeError::connection)?;

        *self.inner.session.write().await = Some(Session {
            uri,
            state: SessionState::Active,
            peer_id: persisted.peer_id.clone(),
            peer_meta: persisted.peer_meta.clone(),
            accounts: persisted.accounts.clone(),
            chain_id: Some(persisted.chain_id),
        });
        self.start_pump(inbound);

        tracing::info!(topic = %persisted.handshake_topic, "session resumed");
        self.inner.emit(SessionEvent::Connected);
        Ok(())
    }

    /// Approve the pending session for `accounts` on `chain_id`.
    ///
    /// Approving an already active session does nothing.
    pub async fn approve_session(&self, accounts: Vec<Address>, chain_id: u64) -> Result<()> {
        let mut guard = self.inner.session.write().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| BridgeError::Protocol("no session to approve".into()))?;
        if session.is_active() {
            return Ok(());
        }

        self.inner
            .transport
            .send(OutboundMessage::approve_session(accounts.clone(), chain_id))
            .await
            .map_err(BridgeError::connection)?;

        session.state = SessionState::Active;
        session.accounts = accounts;
        session.chain_id = Some(chain_id);
        drop(guard);

        tracing::info!(chain_id, "session approved");
        self.inner.emit(SessionEvent::Connected);
        Ok(())
    }

    /// Tell the peer about a new account list or chain
    pub async fn update_session(&self, accounts: Vec<Address>, chain_id: u64) -> Result<()> {
        let mut guard = self.inner.session.write().await;
        let session = guard
            .as_mut()
            .filter(|s| s.is_active())
            .ok_or_else(|| BridgeError::Protocol("no active session".into()))?;

        self.inner
            .transport
            .send(OutboundMessage::approve_session(accounts.clone(), chain_id))
            .await
            .map_err(BridgeError::connection)?;

        session.accounts = accounts;
        session.chain_id = Some(chain_id);
        tracing::info!(chain_id, "session updated");
        Ok(())
    }

    /// Reply with a result to call request `id`
    pub async fn approve_call(&self, id: u64, result: Value) -> Result<()> {
        self.reply(OutboundMessage::approve_call(id, result)).await
    }

    /// Reply with an error to call request `id`
    pub async fn reject_call(&self, id: u64, message: impl Into<String>) -> Result<()> {
        self.reply(OutboundMessage::reject_call(id, message)).await
    }

    /// Reply to call request `id` with an existing error object
    pub async fn reject_call_with(&self, id: u64, error: RpcError) -> Result<()> {
        self.reply(OutboundMessage::reject_call_with(id, error)).await
    }

    async fn reply(&self, message: OutboundMessage) -> Result<()> {
        self.ensure_active().await?;
        self.inner
            .transport
            .send(message)
            .await
            .map_err(BridgeError::connection)
    }

    async fn ensure_active(&self) -> Result<()> {
        match &*self.inner.session.read().await {
            Some(session) if session.is_active() => Ok(()),
            _ => Err(BridgeError::Protocol("no active session".into())),
        }
    }

    /// Tear the session down. Transport failures are logged, never returned.
    pub async fn disconnect(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(pump) = self.take_pump() {
            pump.abort();
        }

        let Some(session) = self.inner.session.write().await.take() else {
            return;
        };

        if session.is_active() {
            if let Err(err) = self.inner.transport.send(OutboundMessage::kill_session()).await {
                tracing::warn!("Failed to notify peer of disconnect: {:#}", err);
            }
        }
        if let Err(err) = self.inner.transport.close().await {
            tracing::warn!("Failed to close session transport: {:#}", err);
        }

        tracing::info!(topic = %session.uri.topic, "session disconnected");
        self.inner.emit(SessionEvent::Disconnected);
    }

    /// Snapshot of the current session
    pub async fn session(&self) -> Option<Session> {
        self.inner.session.read().await.clone()
    }

    pub async fn is_active(&self) -> bool {
        self.ensure_active().await.is_ok()
    }

    /// Storable form of the active session
    pub async fn persisted(&self) -> Option<PersistedSession> {
        let guard = self.inner.session.read().await;
        let session = guard.as_ref().filter(|s| s.is_active())?;
        Some(PersistedSession {
            connected: true,
            accounts: session.accounts.clone(),
            chain_id: session.chain_id?,
            bridge: session.uri.bridge.to_string(),
            key: session.uri.key,
            handshake_topic: session.uri.topic.clone(),
            client_meta: Some(self.inner.client_meta.clone()),
            peer_id: session.peer_id.clone(),
            peer_meta: session.peer_meta.clone(),
        })
    }

    fn take_pump(&self) -> Option<JoinHandle<()>> {
        match self.inner.pump.lock() {
            Ok(mut pump) => pump.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn start_pump(&self, inbound: mpsc::Receiver<InboundMessage>) {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let handle = tokio::spawn(pump(Arc::downgrade(&self.inner), inbound, generation));
        let previous = match self.inner.pump.lock() {
            Ok(mut pump) => pump.replace(handle),
            Err(poisoned) => poisoned.into_inner().replace(handle),
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

async fn pump(
    inner: Weak<PeerInner>,
    mut inbound: mpsc::Receiver<InboundMessage>,
    generation: u64,
) {
    while let Some(message) = inbound.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if !inner.is_current(generation) {
            return;
        }
        inner.handle_inbound(message).await;
    }

    if let Some(inner) = inner.upgrade() {
        if inner.is_current(generation) {
            inner.drop_session("transport closed").await;
        }
    }
}

impl PeerInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn protocol_error(&self, err: BridgeError) {
        tracing::warn!("Dropping peer message: {}", err);
        self.emit(SessionEvent::Error(err.to_string()));
    }

    async fn handle_inbound(&self, message: InboundMessage) {
        match message {
            InboundMessage::SessionRequest {
                peer_id,
                peer_meta,
                chain_id,
            } => {
                let mut guard = self.session.write().await;
                let Some(session) = guard.as_mut() else {
                    self.protocol_error(BridgeError::Protocol(
                        "session request without a handshake".into(),
                    ));
                    return;
                };
                tracing::info!(peer = %peer_meta.name, url = %peer_meta.url, "session requested");
                session.peer_id = Some(peer_id);
                session.peer_meta = Some(peer_meta.clone());
                if session.chain_id.is_none() {
                    session.chain_id = chain_id;
                }
                drop(guard);
                self.emit(SessionEvent::SessionRequested(peer_meta));
            }
            InboundMessage::CallRequest(payload) => {
                let active = self.session.read().await.as_ref().is_some_and(Session::is_active);
                if !active {
                    self.protocol_error(BridgeError::Protocol(
                        "call request without an active session".into(),
                    ));
                    return;
                }
                match CallRequest::from_payload(payload) {
                    Ok(request) => {
                        tracing::info!(id = request.id, method = %request.method, "call request received");
                        self.emit(SessionEvent::CallRequested(request));
                    }
                    Err(err) => self.protocol_error(err),
                }
            }
            InboundMessage::SessionUpdate { approved: false } => {
                self.drop_session("peer ended the session").await;
            }
            InboundMessage::SessionUpdate { approved: true } => {
                tracing::debug!("peer session update ignored");
            }
            InboundMessage::Error(message) => {
                tracing::warn!("Session transport error: {}", message);
                self.emit(SessionEvent::Error(message));
            }
        }
    }

    async fn drop_session(&self, reason: &str) {
        if self.session.write().await.take().is_some() {
            self.generation.fetch_add(1, Ordering::SeqCst);
            tracing::info!(reason, "session disconnected");
            self.emit(SessionEvent::Disconnected);
        }
    }
}
