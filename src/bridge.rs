//! Call request bridge
//!
//! Holds at most one call request from the peer. The operator approves,
//! rejects or edits it; approval signs the request through the Authereum
//! account and every approval ends in exactly one reply to the peer.
//!
//! ```text
//! Idle -> Pending -> Resolving -> Idle
//! ```

use crate::config::{BridgeConfig, NetworkContext};
use crate::constants::{CANCELLED_MESSAGE, DEFAULT_CALL_TIMEOUT, META_TX_GAS_LIMIT};
use crate::error::{BridgeError, Result};
use crate::meta_tx;
use crate::network::Network;
use crate::session::{RpcError, SessionEvent, SessionPeer};
use crate::signer::AccountSigner;
use crate::types::{CallRequest, OuterTransaction, RequestKind, SignedPayload, SignedResult};
use alloy::primitives::{Address, U256};
use futures::future::try_join;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Occupancy of the single request slot
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestState {
    #[default]
    Idle,
    /// Waiting for the operator
    Pending(CallRequest),
    /// Approval or rejection in flight
    Resolving(CallRequest),
}

impl RequestState {
    pub fn request(&self) -> Option<&CallRequest> {
        match self {
            Self::Idle => None,
            Self::Pending(request) | Self::Resolving(request) => Some(request),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// How a request was answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Approved(SignedResult),
    Rejected { id: u64, error: String },
}

impl Resolution {
    pub fn id(&self) -> u64 {
        match self {
            Self::Approved(result) => result.id,
            Self::Rejected { id, .. } => *id,
        }
    }
}

/// Services call requests from a session peer with an Authereum account
#[derive(Clone)]
pub struct CallBridge {
    peer: SessionPeer,
    account: Address,
    call_timeout: Duration,
    signer: Arc<RwLock<AccountSigner>>,
    network: Arc<RwLock<Network>>,
    slot: Arc<Mutex<RequestState>>,
    state: Arc<watch::Sender<RequestState>>,
}

impl std::fmt::Debug for CallBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallBridge")
            .field("account", &self.account)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl CallBridge {
    pub fn new(peer: SessionPeer, signer: AccountSigner, network: Network, account: Address) -> Self {
        let (state, _) = watch::channel(RequestState::Idle);
        Self {
            peer,
            account,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            signer: Arc::new(RwLock::new(signer)),
            network: Arc::new(RwLock::new(network)),
            slot: Arc::new(Mutex::new(RequestState::Idle)),
            state: Arc::new(state),
        }
    }

    /// Build a bridge for `config`, connecting to its RPC endpoint
    pub fn from_config(config: &BridgeConfig, peer: SessionPeer, signer: AccountSigner) -> Self {
        Self::new(peer, signer, Network::connect(config.network.clone()), config.account)
            .with_call_timeout(config.call_timeout)
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn peer(&self) -> &SessionPeer {
        &self.peer
    }

    /// Current slot state
    pub fn state(&self) -> RequestState {
        self.state.borrow().clone()
    }

    /// Observe slot transitions
    pub fn subscribe_state(&self) -> watch::Receiver<RequestState> {
        self.state.subscribe()
    }

    /// Request waiting for the operator, if any
    pub fn pending_request(&self) -> Option<CallRequest> {
        match &*self.state.borrow() {
            RequestState::Pending(request) => Some(request.clone()),
            _ => None,
        }
    }

    pub async fn signer(&self) -> AccountSigner {
        self.signer.read().await.clone()
    }

    pub async fn network(&self) -> NetworkContext {
        self.network.read().await.context().clone()
    }

    /// Replace the active signer. A request already resolving keeps the old one.
    pub async fn set_signer(&self, signer: AccountSigner) {
        tracing::info!(kind = %signer.kind(), address = %signer.address(), "signer replaced");
        *self.signer.write().await = signer;
    }

    /// Replace the network and tell an active peer about the new chain
    pub async fn switch_network(&self, network: Network) {
        let chain_id = network.chain_id();
        tracing::info!(network = %network.context().name, chain_id, "network switched");
        *self.network.write().await = network;

        if self.peer.is_active().await {
            if let Err(err) = self.peer.update_session(vec![self.account], chain_id).await {
                tracing::warn!("Failed to update session chain: {}", err);
            }
        }
    }

    /// Resolve a known network by name and switch to it
    pub async fn select_network(&self, name: &str, rpc_url_template: &str) -> Result<()> {
        let context =
            NetworkContext::resolve(name, rpc_url_template).map_err(BridgeError::network)?;
        self.switch_network(Network::connect(context)).await;
        Ok(())
    }

    /// Run the event loop on a background task.
    ///
    /// Events skipped after lagging behind the session are lost; a call
    /// request among them is never answered and the peer has to resend it.
    pub fn spawn(&self) -> JoinHandle<()> {
        let bridge = self.clone();
        let mut events = self.peer.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => bridge.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "bridge lagged behind session events, dropped them");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// React to one session event
    pub async fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::SessionRequested(meta) => {
                let chain_id = self.network.read().await.chain_id();
                tracing::info!(peer = %meta.name, chain_id, "approving session");
                if let Err(err) = self.peer.approve_session(vec![self.account], chain_id).await {
                    tracing::warn!("Failed to approve session: {}", err);
                }
            }
            SessionEvent::CallRequested(request) => self.accept(request).await,
            SessionEvent::Disconnected => {
                let mut slot = self.slot.lock().await;
                if let Some(request) = slot.request() {
                    tracing::info!(id = request.id, "discarding request of closed session");
                }
                self.set_state(&mut slot, RequestState::Idle);
            }
            SessionEvent::Connected => tracing::debug!("session connected"),
            SessionEvent::Error(message) => tracing::warn!("Session error: {}", message),
        }
    }

    async fn accept(&self, request: CallRequest) {
        let busy = {
            let mut slot = self.slot.lock().await;
            match slot.request() {
                Some(current) => Some(current.id),
                None => {
                    tracing::info!(id = request.id, method = %request.method, "call request pending");
                    self.set_state(&mut slot, RequestState::Pending(request.clone()));
                    None
                }
            }
        };

        if let Some(current) = busy {
            tracing::warn!(id = request.id, pending = current, "rejecting request while busy");
            let message = format!("Busy: request {} is still pending", current);
            if let Err(err) = self.peer.reject_call(request.id, message).await {
                tracing::warn!("Failed to reject request {}: {}", request.id, err);
            }
        }
    }

    /// Approve the pending request.
    ///
    /// Any failure while servicing it is answered with a rejection and
    /// returned as [`Resolution::Rejected`].
    pub async fn approve(&self) -> Result<Resolution> {
        let request = self.begin_resolving().await?;
        let signer = self.signer.read().await.clone();
        let network = self.network.read().await.clone();

        let outcome = match tokio::time::timeout(
            self.call_timeout,
            self.service(&request, &signer, &network),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(BridgeError::Timeout(self.call_timeout)),
        };

        let resolution = match outcome {
            Ok(payload) => {
                tracing::info!(id = request.id, method = %request.method, "call request approved");
                self.send_reply(request.id, self.peer.approve_call(request.id, payload.to_json()))
                    .await;
                Resolution::Approved(SignedResult {
                    id: request.id,
                    payload,
                })
            }
            Err(err) => {
                tracing::warn!(id = request.id, method = %request.method, "call request failed: {}", err);
                let error = err.to_string();
                self.send_reply(request.id, self.peer.reject_call(request.id, error.clone()))
                    .await;
                Resolution::Rejected {
                    id: request.id,
                    error,
                }
            }
        };

        self.finish(request.id).await;
        Ok(resolution)
    }

    /// Reject the pending request, forwarding its own error if it has one
    pub async fn reject(&self) -> Result<Resolution> {
        let request = self.begin_resolving().await?;
        let error = request
            .error
            .clone()
            .unwrap_or_else(|| RpcError::rejection(CANCELLED_MESSAGE));

        tracing::info!(
            id = request.id,
            method = %request.method,
            code = error.code,
            error = %error.message,
            "call request rejected"
        );
        self.send_reply(request.id, self.peer.reject_call_with(request.id, error.clone()))
            .await;
        self.finish(request.id).await;

        Ok(Resolution::Rejected {
            id: request.id,
            error: error.message,
        })
    }

    /// Replace the pending request with an edited version.
    ///
    /// Returns `false` and keeps the old request when `raw` does not describe
    /// a serviceable request.
    pub async fn edit_request(&self, raw: &str) -> Result<bool> {
        let mut slot = self.slot.lock().await;
        let RequestState::Pending(current) = &*slot else {
            return Err(BridgeError::invalid_state("no pending request to edit"));
        };

        match current.edited(raw) {
            Ok(updated) => {
                tracing::info!(id = updated.id, "call request edited");
                self.set_state(&mut slot, RequestState::Pending(updated));
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(id = current.id, "Ignoring invalid edit: {}", err);
                Ok(false)
            }
        }
    }

    async fn begin_resolving(&self) -> Result<CallRequest> {
        let mut slot = self.slot.lock().await;
        match &*slot {
            RequestState::Pending(request) => {
                let request = request.clone();
                self.set_state(&mut slot, RequestState::Resolving(request.clone()));
                Ok(request)
            }
            RequestState::Resolving(request) => Err(BridgeError::invalid_state(format!(
                "request {} is already being resolved",
                request.id
            ))),
            RequestState::Idle => Err(BridgeError::invalid_state("no pending request")),
        }
    }

    /// Clear the slot if it still holds request `id`
    async fn finish(&self, id: u64) {
        let mut slot = self.slot.lock().await;
        if slot.request().is_some_and(|request| request.id == id) {
            self.set_state(&mut slot, RequestState::Idle);
        }
    }

    /// Deliver a reply, bounded by the call timeout
    async fn send_reply(&self, id: u64, reply: impl std::future::Future<Output = Result<()>>) {
        match tokio::time::timeout(self.call_timeout, reply).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(id, "Failed to reply to peer: {}", err),
            Err(_) => tracing::warn!(id, timeout = ?self.call_timeout, "reply to peer timed out"),
        }
    }

    fn set_state(&self, slot: &mut RequestState, next: RequestState) {
        *slot = next.clone();
        self.state.send_replace(next);
    }

    async fn service(
        &self,
        request: &CallRequest,
        signer: &AccountSigner,
        network: &Network,
    ) -> Result<SignedPayload> {
        match request.kind() {
            kind if kind.is_transaction() => self.send_transaction(request, signer, network).await,
            RequestKind::SignMessage => {
                let message = request.message()?;
                tracing::info!(id = request.id, len = message.as_bytes().len(), "signing message");
                tracing::debug!(id = request.id, message = %message.text(), "message text");
                let signature = signer.sign_message(message.as_bytes()).await?;
                Ok(SignedPayload::Signature(signature))
            }
            _ => Err(BridgeError::Protocol(format!(
                "unsupported method {}",
                request.method
            ))),
        }
    }

    async fn send_transaction(
        &self,
        request: &CallRequest,
        signer: &AccountSigner,
        network: &Network,
    ) -> Result<SignedPayload> {
        let params = request.transaction_params()?;
        let logical = params.to_logical()?;
        let data = meta_tx::encode(&logical);

        let from = signer.address();
        let (nonce, gas_price) = match params.gas_price()? {
            Some(gas_price) => (network.nonce(from).await?, gas_price),
            None => try_join(network.nonce(from), network.gas_price()).await?,
        };

        let tx = OuterTransaction {
            to: self.account,
            value: U256::ZERO,
            data,
            gas_limit: META_TX_GAS_LIMIT,
            gas_price,
            nonce,
            chain_id: network.chain_id(),
        };
        tracing::info!(
            id = request.id,
            to = %logical.to,
            nonce,
            gas_price,
            chain_id = tx.chain_id,
            "sending meta-transaction"
        );

        let hash = match signer {
            AccountSigner::Key(key) => {
                let raw = key.sign_transaction(&tx)?;
                network.broadcast(&raw).await?
            }
            AccountSigner::Provider(provider) => provider.send_transaction(&tx).await?,
        };

        Ok(SignedPayload::TransactionHash(hash))
    }
}
