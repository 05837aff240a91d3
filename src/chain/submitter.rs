//! Native currency transfers
//!
//! A transfer moves through `Unsent -> Signed -> Broadcast -> Pending ->
//! Confirmed`. The only retried step is the receipt lookup while the
//! transaction is pending; the wait between lookups is raced against a
//! cancellation token and an optional overall timeout so a silent endpoint
//! cannot hang the caller.

use crate::chain::{ChainClient, Connector, ReceiptSummary};
use crate::config::ReceiptConfig;
use crate::journal::{JournalEntry, TransferJournal};
use crate::wallet::{LocalKey, Network};
use crate::{Error, Result};
use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Gas limit for a plain value transfer
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Lifecycle of a submitted transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Unsent,
    Signed,
    Broadcast,
    Pending,
    Confirmed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferState::Unsent => "unsent",
            TransferState::Signed => "signed",
            TransferState::Broadcast => "broadcast",
            TransferState::Pending => "pending",
            TransferState::Confirmed => "confirmed",
        };
        f.write_str(name)
    }
}

/// Controls how long confirmation is awaited
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Delay between receipt lookups
    pub poll_interval: Duration,
    /// Abort with `ReceiptTimeout` after this long (None = until cancelled)
    pub timeout: Option<Duration>,
    /// Cancelling aborts the wait with `Cancelled`
    pub cancel: CancellationToken,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl SubmitOptions {
    pub fn from_config(config: &ReceiptConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
            cancel: CancellationToken::new(),
        }
    }
}

/// A confirmed transfer
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    /// Amount in smallest units
    pub amount: U256,
    pub network: Network,
    pub hash: TxHash,
    pub gas_used: U256,
    pub gas_price: U256,
    /// Receipt status; false when the transfer was mined but reverted
    pub succeeded: bool,
}

impl Transaction {
    /// Total fee paid (`gas_used * gas_price`)
    pub fn fee(&self) -> U256 {
        self.gas_used * self.gas_price
    }
}

/// Builds, signs, broadcasts and confirms native transfers
pub struct TransactionSubmitter<K> {
    connector: K,
    options: SubmitOptions,
    journal: Option<TransferJournal>,
}

impl<K: Connector> TransactionSubmitter<K> {
    pub fn new(connector: K, options: SubmitOptions) -> Self {
        Self {
            connector,
            options,
            journal: None,
        }
    }

    /// Record lifecycle events to a transfer journal
    pub fn with_journal(mut self, journal: TransferJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Token that aborts an in-flight confirmation wait
    pub fn cancellation_token(&self) -> CancellationToken {
        self.options.cancel.clone()
    }

    /// Send `amount` smallest units to `to`, signed by `private_key`, and wait for the receipt
    pub async fn send(
        &self,
        private_key: &SecretString,
        to: Address,
        amount: U256,
        network: &Network,
    ) -> Result<Transaction> {
        let client = self.connector.connect(network).await?;

        let key = LocalKey::from_hex(private_key.expose_secret())?;
        let from = key.address();

        let nonce = client.pending_nonce_at(from).await.map_err(Error::Rpc)?;
        let gas_price = client.suggest_gas_price().await.map_err(Error::Rpc)?;

        let mut tx = TxLegacy {
            chain_id: Some(network.chain_id),
            nonce,
            gas_price,
            gas_limit: TRANSFER_GAS_LIMIT,
            to: TxKind::Call(to),
            value: amount,
            input: Bytes::new(),
        };
        tracing::debug!(
            state = %TransferState::Unsent,
            from = %from,
            to = %to,
            nonce,
            gas_price,
            chain_id = network.chain_id,
            "Built transfer"
        );

        let signature = key.sign_transaction(&mut tx)?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        let hash = *envelope.tx_hash();
        tracing::debug!(state = %TransferState::Signed, hash = %hash, "Signed transfer");

        let accepted = client
            .send_raw_transaction(&envelope.encoded_2718())
            .await
            .map_err(Error::Broadcast)?;
        if accepted != hash {
            tracing::warn!(local = %hash, remote = %accepted, "Node reported a different transaction hash");
        }
        tracing::info!(
            state = %TransferState::Broadcast,
            hash = %hash,
            network = %network.label,
            "Transfer broadcast"
        );
        if let Some(journal) = &self.journal {
            journal
                .record(JournalEntry::submitted(&network.label, from, to, amount, hash))
                .await;
        }

        let receipt = match self.await_receipt(&client, hash).await {
            Ok(receipt) => receipt,
            Err(e) => {
                if let Some(journal) = &self.journal {
                    journal
                        .record(JournalEntry::failed(&network.label, from, to, amount, hash, &e))
                        .await;
                }
                return Err(e);
            }
        };

        if !receipt.success {
            tracing::warn!(hash = %hash, "Transfer was mined but reverted");
        }
        tracing::info!(
            state = %TransferState::Confirmed,
            hash = %hash,
            gas_used = receipt.gas_used,
            "Transfer confirmed"
        );

        let transaction = Transaction {
            from,
            to,
            amount,
            network: network.clone(),
            hash,
            gas_used: U256::from(receipt.gas_used),
            gas_price: U256::from(receipt.effective_gas_price),
            succeeded: receipt.success,
        };
        if let Some(journal) = &self.journal {
            journal.record(JournalEntry::confirmed(&transaction)).await;
        }
        Ok(transaction)
    }

    /// Wait for the receipt, honouring cancellation and the optional timeout
    async fn await_receipt<C: ChainClient>(&self, client: &C, hash: TxHash) -> Result<ReceiptSummary> {
        let poll = poll_receipt(client, hash, self.options.poll_interval);
        let bounded = async {
            match self.options.timeout {
                Some(limit) => match tokio::time::timeout(limit, poll).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::ReceiptTimeout {
                        hash: hash.to_string(),
                        waited: limit,
                    }),
                },
                None => poll.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.options.cancel.cancelled() => Err(Error::Cancelled { hash: hash.to_string() }),
            result = bounded => result,
        }
    }
}

async fn poll_receipt<C: ChainClient>(
    client: &C,
    hash: TxHash,
    interval: Duration,
) -> Result<ReceiptSummary> {
    let mut attempts: u64 = 0;
    loop {
        attempts += 1;
        match client.transaction_receipt(hash).await {
            Ok(Some(receipt)) => return Ok(receipt),
            Ok(None) => {
                tracing::debug!(
                    state = %TransferState::Pending,
                    hash = %hash,
                    attempts,
                    "Receipt not yet available"
                );
                tokio::time::sleep(interval).await;
            }
            Err(e) => return Err(Error::Receipt(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcError;
    use alloy::eips::eip2718::Decodable2718;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const GAS_PRICE: u128 = 2_000_000_000;

    #[derive(Default)]
    struct ChainState {
        balances: HashMap<Address, U256>,
        nonces: HashMap<Address, u64>,
        /// Receipt lookups answered with `None` before a receipt appears
        pending_polls: usize,
        receipt_polls: usize,
        receipts: HashMap<TxHash, ReceiptSummary>,
        sent: Vec<TxEnvelope>,
        receipt_error: Option<RpcError>,
    }

    /// In-memory chain that executes legacy transfers from a single known sender
    #[derive(Clone)]
    struct MockChain {
        chain_id: u64,
        sender: Address,
        state: Arc<Mutex<ChainState>>,
    }

    impl MockChain {
        fn new(chain_id: u64, sender: Address, funds: U256) -> Self {
            let mut state = ChainState::default();
            state.balances.insert(sender, funds);
            Self {
                chain_id,
                sender,
                state: Arc::new(Mutex::new(state)),
            }
        }

        fn balance(&self, address: Address) -> U256 {
            self.state
                .lock()
                .unwrap()
                .balances
                .get(&address)
                .copied()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChainClient for MockChain {
        async fn chain_id(&self) -> std::result::Result<u64, RpcError> {
            Ok(self.chain_id)
        }

        async fn balance_at(&self, address: Address) -> std::result::Result<U256, RpcError> {
            Ok(self.balance(address))
        }

        async fn call_contract(&self, _to: Address, _data: Bytes) -> std::result::Result<Bytes, RpcError> {
            Ok(Bytes::new())
        }

        async fn pending_nonce_at(&self, address: Address) -> std::result::Result<u64, RpcError> {
            Ok(self.state.lock().unwrap().nonces.get(&address).copied().unwrap_or(0))
        }

        async fn suggest_gas_price(&self) -> std::result::Result<u128, RpcError> {
            Ok(GAS_PRICE)
        }

        async fn send_raw_transaction(&self, raw: &[u8]) -> std::result::Result<TxHash, RpcError> {
            let mut state = self.state.lock().unwrap();
            let envelope = TxEnvelope::decode_2718(&mut &raw[..])
                .map_err(|e| RpcError::new("eth_sendRawTransaction", e))?;
            let legacy = envelope
                .as_legacy()
                .ok_or_else(|| RpcError::new("eth_sendRawTransaction", "expected legacy tx"))?
                .tx()
                .clone();

            if legacy.chain_id != Some(self.chain_id) {
                return Err(RpcError::new("eth_sendRawTransaction", "invalid chain id"));
            }
            let expected_nonce = state.nonces.get(&self.sender).copied().unwrap_or(0);
            if legacy.nonce != expected_nonce {
                return Err(RpcError::new("eth_sendRawTransaction", "nonce too low"));
            }
            let TxKind::Call(to) = legacy.to else {
                return Err(RpcError::new("eth_sendRawTransaction", "contract creation"));
            };

            let gas_used = TRANSFER_GAS_LIMIT;
            let cost = legacy.value + U256::from(gas_used) * U256::from(legacy.gas_price);
            let balance = state.balances.get(&self.sender).copied().unwrap_or_default();
            if balance < cost {
                return Err(RpcError::new("eth_sendRawTransaction", "insufficient funds"));
            }

            state.balances.insert(self.sender, balance - cost);
            *state.balances.entry(to).or_default() += legacy.value;
            state.nonces.insert(self.sender, expected_nonce + 1);

            let hash = *envelope.tx_hash();
            state.receipts.insert(
                hash,
                ReceiptSummary {
                    gas_used,
                    effective_gas_price: legacy.gas_price,
                    success: true,
                },
            );
            state.sent.push(envelope);
            Ok(hash)
        }

        async fn transaction_receipt(
            &self,
            hash: TxHash,
        ) -> std::result::Result<Option<ReceiptSummary>, RpcError> {
            let mut state = self.state.lock().unwrap();
            state.receipt_polls += 1;
            if let Some(err) = &state.receipt_error {
                return Err(err.clone());
            }
            if state.pending_polls > 0 {
                state.pending_polls -= 1;
                return Ok(None);
            }
            Ok(state.receipts.get(&hash).copied())
        }
    }

    struct MockConnector {
        chain: MockChain,
        reachable: bool,
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Client = MockChain;

        async fn connect(&self, network: &Network) -> Result<MockChain> {
            if !self.reachable {
                return Err(Error::Connection(format!("{}: connection refused", network.rpc_url)));
            }
            Ok(self.chain.clone())
        }
    }

    fn sender() -> Address {
        LocalKey::from_hex(TEST_KEY).unwrap().address()
    }

    fn network() -> Network {
        Network::new("local", 1337, "ETH", "http://localhost:8545")
    }

    fn fast_options() -> SubmitOptions {
        SubmitOptions {
            poll_interval: Duration::from_millis(1),
            ..SubmitOptions::default()
        }
    }

    fn submitter(chain: &MockChain, options: SubmitOptions) -> TransactionSubmitter<MockConnector> {
        TransactionSubmitter::new(
            MockConnector {
                chain: chain.clone(),
                reachable: true,
            },
            options,
        )
    }

    fn key() -> SecretString {
        SecretString::from(TEST_KEY)
    }

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(10).pow(U256::from(18))
    }

    #[tokio::test]
    async fn test_transfer_moves_funds_and_reports_fee() {
        let chain = MockChain::new(1337, sender(), ether(10));
        let recipient = Address::repeat_byte(0x42);
        let amount = ether(1);
        let before = chain.balance(sender());

        let tx = submitter(&chain, fast_options())
            .send(&key(), recipient, amount, &network())
            .await
            .unwrap();

        assert_eq!(tx.from, sender());
        assert_eq!(tx.to, recipient);
        assert_eq!(tx.amount, amount);
        assert_eq!(tx.network.label, "local");
        assert_eq!(tx.gas_used, U256::from(TRANSFER_GAS_LIMIT));
        assert_eq!(tx.gas_price, U256::from(GAS_PRICE));
        assert!(tx.succeeded);

        let after = chain.balance(sender());
        assert_eq!(before - after, amount + tx.gas_used * tx.gas_price);
        assert_eq!(chain.balance(recipient), amount);
    }

    #[tokio::test]
    async fn test_signed_transfer_fields() {
        let chain = MockChain::new(1337, sender(), ether(10));
        let recipient = Address::repeat_byte(0x42);

        let tx = submitter(&chain, fast_options())
            .send(&key(), recipient, U256::from(5), &network())
            .await
            .unwrap();

        let state = chain.state.lock().unwrap();
        let sent = state.sent[0].as_legacy().unwrap();
        assert_eq!(*sent.hash(), tx.hash);
        assert_eq!(sent.tx().chain_id, Some(1337));
        assert_eq!(sent.tx().gas_limit, TRANSFER_GAS_LIMIT);
        assert_eq!(sent.tx().nonce, 0);
        assert_eq!(sent.tx().to, TxKind::Call(recipient));
        assert!(sent.tx().input.is_empty());
    }

    #[tokio::test]
    async fn test_nonce_follows_pending_state() {
        let chain = MockChain::new(1337, sender(), ether(10));
        let submitter = submitter(&chain, fast_options());
        let recipient = Address::repeat_byte(0x42);

        submitter.send(&key(), recipient, U256::from(1), &network()).await.unwrap();
        submitter.send(&key(), recipient, U256::from(1), &network()).await.unwrap();

        let state = chain.state.lock().unwrap();
        let nonces: Vec<u64> = state
            .sent
            .iter()
            .map(|tx| tx.as_legacy().unwrap().tx().nonce)
            .collect();
        assert_eq!(nonces, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_polls_until_receipt_available() {
        let chain = MockChain::new(1337, sender(), ether(10));
        chain.state.lock().unwrap().pending_polls = 3;

        submitter(&chain, fast_options())
            .send(&key(), Address::repeat_byte(0x42), U256::from(1), &network())
            .await
            .unwrap();

        assert_eq!(chain.state.lock().unwrap().receipt_polls, 4);
    }

    #[tokio::test]
    async fn test_receipt_error_aborts() {
        let chain = MockChain::new(1337, sender(), ether(10));
        chain.state.lock().unwrap().receipt_error =
            Some(RpcError::new("eth_getTransactionReceipt", "internal error"));

        let err = submitter(&chain, fast_options())
            .send(&key(), Address::repeat_byte(0x42), U256::from(1), &network())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Receipt(ref e) if e.message == "internal error"));
        assert_eq!(chain.state.lock().unwrap().receipt_polls, 1);
    }

    #[tokio::test]
    async fn test_timeout_bounds_pending_wait() {
        let chain = MockChain::new(1337, sender(), ether(10));
        chain.state.lock().unwrap().pending_polls = usize::MAX;
        let options = SubmitOptions {
            poll_interval: Duration::from_millis(5),
            timeout: Some(Duration::from_millis(50)),
            ..SubmitOptions::default()
        };

        let err = submitter(&chain, options)
            .send(&key(), Address::repeat_byte(0x42), U256::from(1), &network())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ReceiptTimeout { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_stops_pending_wait() {
        let chain = MockChain::new(1337, sender(), ether(10));
        chain.state.lock().unwrap().pending_polls = usize::MAX;
        let submitter = submitter(&chain, fast_options());

        let token = submitter.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = submitter
            .send(&key(), Address::repeat_byte(0x42), U256::from(1), &network())
            .await
            .unwrap_err();

        let hash = match err {
            Error::Cancelled { hash } => hash,
            other => panic!("expected Cancelled, got {other:?}"),
        };
        // The transfer was broadcast before the wait was abandoned
        let state = chain.state.lock().unwrap();
        assert_eq!(hash, state.sent[0].tx_hash().to_string());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let chain = MockChain::new(1337, sender(), ether(10));
        let submitter = TransactionSubmitter::new(
            MockConnector {
                chain: chain.clone(),
                reachable: false,
            },
            fast_options(),
        );

        let err = submitter
            .send(&key(), Address::repeat_byte(0x42), U256::from(1), &network())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(chain.state.lock().unwrap().sent.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_key_rejected_before_rpc() {
        let chain = MockChain::new(1337, sender(), ether(10));

        let err = submitter(&chain, fast_options())
            .send(
                &SecretString::from("0xnot-a-key"),
                Address::repeat_byte(0x42),
                U256::from(1),
                &network(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
        assert!(chain.state.lock().unwrap().sent.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_rejection() {
        let chain = MockChain::new(1337, sender(), U256::from(1));

        let err = submitter(&chain, fast_options())
            .send(&key(), Address::repeat_byte(0x42), ether(1), &network())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Broadcast(ref e) if e.message == "insufficient funds"));
        assert_eq!(chain.state.lock().unwrap().receipt_polls, 0);
    }

    #[tokio::test]
    async fn test_wrong_chain_id_is_rejected_by_node() {
        let chain = MockChain::new(1, sender(), ether(10));

        let err = submitter(&chain, fast_options())
            .send(&key(), Address::repeat_byte(0x42), U256::from(1), &network())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Broadcast(_)));
    }

    #[tokio::test]
    async fn test_journal_records_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transfers.jsonl");
        let chain = MockChain::new(1337, sender(), ether(10));

        let tx = submitter(&chain, fast_options())
            .with_journal(TransferJournal::new(&path))
            .send(&key(), Address::repeat_byte(0x42), U256::from(9), &network())
            .await
            .unwrap();

        let entries = crate::journal::read_entries(&path).unwrap();
        let events: Vec<&str> = entries.iter().map(|e| e["event"].as_str().unwrap()).collect();
        assert_eq!(events, vec!["submitted", "confirmed"]);
        assert_eq!(entries[1]["hash"], tx.hash.to_string());
        assert_eq!(entries[1]["gas_used"], "21000");
    }

    #[test]
    fn test_options_from_config() {
        let config = ReceiptConfig {
            poll_interval_ms: 250,
            timeout_secs: Some(30),
        };
        let options = SubmitOptions::from_config(&config);
        assert_eq!(options.poll_interval, Duration::from_millis(250));
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
        assert!(!options.cancel.is_cancelled());
    }
}
