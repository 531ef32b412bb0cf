//! In-memory fakes for the transport, chain RPC and wallet seams

use crate::network::ChainRpc;
use crate::session::{
    ConnectionUri, InboundMessage, OutboundMessage, PeerMeta, PersistedSession, SessionTransport,
};
use crate::signer::{KeySigner, WalletKind, WalletProvider};
use crate::types::OuterTransaction;
use alloy::primitives::{keccak256, Address, Bytes, Signature, TxHash, B256};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Route `tracing` output through the test harness
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub(crate) const TEST_URI: &str = "wc:8a5e5bdc-a0e4-4702-ba63-8f1a5655744f@1?bridge=https%3A%2F%2Fbridge.walletconnect.org&key=41791102999c339c844880b23950704cc43aa840f3739e365323cda4dfa89e7a";

/// Transport that records everything sent and lets tests inject peer messages
#[derive(Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<OutboundMessage>>,
    inbound: Mutex<Option<mpsc::Sender<InboundMessage>>>,
    connects: AtomicUsize,
    resumes: AtomicUsize,
    closed: AtomicBool,
    refuse_connect: bool,
    fail_close: bool,
    fail_send: AtomicBool,
    hang_send: AtomicBool,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn refusing_connect(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    pub(crate) fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub(crate) fn set_failing_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Make `send` never complete
    pub(crate) fn set_hanging_send(&self, hang: bool) {
        self.hang_send.store(hang, Ordering::SeqCst);
    }

    /// Deliver a message as if it came from the peer
    pub(crate) async fn push(&self, message: InboundMessage) {
        let sender = self.inbound.lock().unwrap().clone();
        sender
            .expect("transport not connected")
            .send(message)
            .await
            .expect("pump stopped");
    }

    /// Drop the inbound channel as if the connection died
    pub(crate) fn hang_up(&self) {
        self.inbound.lock().unwrap().take();
    }

    pub(crate) fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Replies sent for call request `id`
    pub(crate) fn replies_to(&self, id: u64) -> Vec<OutboundMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.call_id() == Some(id))
            .collect()
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn open_channel(&self) -> mpsc::Receiver<InboundMessage> {
        let (tx, rx) = mpsc::channel(16);
        *self.inbound.lock().unwrap() = Some(tx);
        self.closed.store(false, Ordering::SeqCst);
        rx
    }
}

#[async_trait]
impl SessionTransport for RecordingTransport {
    async fn connect(
        &self,
        _uri: &ConnectionUri,
        _client_meta: &PeerMeta,
    ) -> eyre::Result<mpsc::Receiver<InboundMessage>> {
        if self.refuse_connect {
            eyre::bail!("relay unreachable");
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.open_channel())
    }

    async fn resume(
        &self,
        _session: &PersistedSession,
    ) -> eyre::Result<mpsc::Receiver<InboundMessage>> {
        if self.refuse_connect {
            eyre::bail!("relay unreachable");
        }
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(self.open_channel())
    }

    async fn send(&self, message: OutboundMessage) -> eyre::Result<()> {
        if self.hang_send.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_send.load(Ordering::SeqCst) {
            eyre::bail!("relay dropped the message");
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn close(&self) -> eyre::Result<()> {
        self.inbound.lock().unwrap().take();
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            eyre::bail!("socket already closed");
        }
        Ok(())
    }
}

/// Node with a fixed nonce and gas price; broadcasts hash to `keccak256(raw)`
pub(crate) struct ScriptedRpc {
    nonce: u64,
    gas_price: u128,
    broadcast_error: Option<String>,
    broadcasts: Mutex<Vec<Bytes>>,
    gas_price_calls: AtomicUsize,
}

impl ScriptedRpc {
    pub(crate) fn new(nonce: u64, gas_price: u128) -> Self {
        Self {
            nonce,
            gas_price,
            broadcast_error: None,
            broadcasts: Mutex::new(Vec::new()),
            gas_price_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_broadcast(mut self, message: impl Into<String>) -> Self {
        self.broadcast_error = Some(message.into());
        self
    }

    pub(crate) fn broadcasts(&self) -> Vec<Bytes> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub(crate) fn gas_price_calls(&self) -> usize {
        self.gas_price_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainRpc for ScriptedRpc {
    async fn transaction_count(&self, _address: Address) -> eyre::Result<u64> {
        Ok(self.nonce)
    }

    async fn gas_price(&self) -> eyre::Result<u128> {
        self.gas_price_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.gas_price)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> eyre::Result<TxHash> {
        if let Some(message) = &self.broadcast_error {
            eyre::bail!("{}", message);
        }
        self.broadcasts.lock().unwrap().push(Bytes::copy_from_slice(raw));
        Ok(keccak256(raw))
    }
}

/// Hash every [`ScriptedWallet`] returns for a send
pub(crate) const WALLET_TX_HASH: B256 = B256::repeat_byte(0xab);

/// External wallet backed by a local key; clones share their send log
#[derive(Clone)]
pub(crate) struct ScriptedWallet {
    key: KeySigner,
    failure: Option<String>,
    delay: Option<Duration>,
    sent: Arc<Mutex<Vec<OuterTransaction>>>,
}

impl ScriptedWallet {
    pub(crate) fn random() -> Self {
        Self::from_key(KeySigner::random())
    }

    pub(crate) fn from_key(key: KeySigner) -> Self {
        Self {
            key,
            failure: None,
            delay: None,
            sent: Arc::default(),
        }
    }

    pub(crate) fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn sent(&self) -> Vec<OuterTransaction> {
        self.sent.lock().unwrap().clone()
    }

    async fn prepare(&self) -> eyre::Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(message) => eyre::bail!("{}", message),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WalletProvider for ScriptedWallet {
    fn kind(&self) -> WalletKind {
        WalletKind::JsonRpc
    }

    fn address(&self) -> Address {
        self.key.address()
    }

    async fn sign_message(&self, message: &[u8]) -> eyre::Result<Signature> {
        self.prepare().await?;
        Ok(self.key.sign_message(message).await?)
    }

    async fn send_transaction(&self, tx: &OuterTransaction) -> eyre::Result<TxHash> {
        self.prepare().await?;
        self.sent.lock().unwrap().push(tx.clone());
        Ok(WALLET_TX_HASH)
    }
}
