//! JSON-RPC boundary
//!
//! The wallet never speaks the JSON-RPC protocol itself. [`ChainClient`]
//! names the handful of calls it needs and [`AlloyClient`] fulfils them with
//! alloy's HTTP provider. Tests substitute an in-memory implementation.

pub mod balance;
pub mod submitter;

pub use submitter::{SubmitOptions, Transaction, TransactionSubmitter, TransferState};

use crate::error::RpcError;
use crate::wallet::Network;
use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

/// Realized cost of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub gas_used: u64,
    pub effective_gas_price: u128,
    pub success: bool,
}

/// The JSON-RPC calls the wallet relies on
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `eth_chainId`
    async fn chain_id(&self) -> std::result::Result<u64, RpcError>;

    /// `eth_getBalance` at the latest block
    async fn balance_at(&self, address: Address) -> std::result::Result<U256, RpcError>;

    /// `eth_call` against the latest block
    async fn call_contract(&self, to: Address, data: Bytes) -> std::result::Result<Bytes, RpcError>;

    /// `eth_getTransactionCount` against the pending state
    async fn pending_nonce_at(&self, address: Address) -> std::result::Result<u64, RpcError>;

    /// `eth_gasPrice`
    async fn suggest_gas_price(&self) -> std::result::Result<u128, RpcError>;

    /// `eth_sendRawTransaction`
    async fn send_raw_transaction(&self, raw: &[u8]) -> std::result::Result<TxHash, RpcError>;

    /// `eth_getTransactionReceipt`; `None` while the transaction is not yet mined
    async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> std::result::Result<Option<ReceiptSummary>, RpcError>;
}

/// Opens a [`ChainClient`] for a stored network
#[async_trait]
pub trait Connector: Send + Sync {
    type Client: ChainClient;

    /// Fails with `Connection` if the endpoint cannot be reached
    async fn connect(&self, network: &Network) -> Result<Self::Client>;
}

/// [`ChainClient`] backed by alloy's HTTP provider
#[derive(Clone, Debug)]
pub struct AlloyClient {
    provider: DynProvider,
}

impl AlloyClient {
    pub fn new(url: url::Url) -> Self {
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Self { provider }
    }
}

#[async_trait]
impl ChainClient for AlloyClient {
    async fn chain_id(&self) -> std::result::Result<u64, RpcError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| RpcError::new("eth_chainId", e))
    }

    async fn balance_at(&self, address: Address) -> std::result::Result<U256, RpcError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| RpcError::new("eth_getBalance", e))
    }

    async fn call_contract(&self, to: Address, data: Bytes) -> std::result::Result<Bytes, RpcError> {
        let tx = TransactionRequest::default().to(to).input(data.into());
        self.provider
            .call(tx)
            .await
            .map_err(|e| RpcError::new("eth_call", e))
    }

    async fn pending_nonce_at(&self, address: Address) -> std::result::Result<u64, RpcError> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| RpcError::new("eth_getTransactionCount", e))
    }

    async fn suggest_gas_price(&self) -> std::result::Result<u128, RpcError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| RpcError::new("eth_gasPrice", e))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> std::result::Result<TxHash, RpcError> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| RpcError::new("eth_sendRawTransaction", e))?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> std::result::Result<Option<ReceiptSummary>, RpcError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| RpcError::new("eth_getTransactionReceipt", e))?;

        Ok(receipt.map(|r| ReceiptSummary {
            gas_used: r.gas_used,
            effective_gas_price: r.effective_gas_price,
            success: r.status(),
        }))
    }
}

/// Connects to a network's HTTP endpoint and checks it answers
#[derive(Debug, Clone, Copy, Default)]
pub struct AlloyConnector;

#[async_trait]
impl Connector for AlloyConnector {
    type Client = AlloyClient;

    async fn connect(&self, network: &Network) -> Result<AlloyClient> {
        let url = network.url()?;
        let client = AlloyClient::new(url);

        // HTTP transports are lazy; probe once so an unreachable endpoint fails here
        let remote_chain_id = client
            .chain_id()
            .await
            .map_err(|e| Error::Connection(format!("{}: {}", network.rpc_url, e)))?;

        if remote_chain_id != network.chain_id {
            tracing::warn!(
                network = %network.label,
                configured = network.chain_id,
                remote = remote_chain_id,
                "Endpoint reports a different chain id than configured"
            );
        }

        tracing::debug!(network = %network.label, url = %network.rpc_url, "Connected");
        Ok(client)
    }
}
