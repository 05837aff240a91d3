//! EVM Wallet
//!
//! A local wallet for EVM chains that:
//! - Keeps labelled accounts and networks in an embedded LMDB store
//! - Tracks exactly one selected account and one selected network
//! - Signs and broadcasts native transfers, then waits for the receipt
//!
//! # Security Model
//!
//! - Private keys are held as `SecretString` and never logged
//! - The store is locked to a single process
//! - Every broadcast transfer is journaled by hash

pub mod chain;
pub mod config;
pub mod journal;
pub mod store;
pub mod units;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use chain::{AlloyConnector, ChainClient, Connector, SubmitOptions, Transaction, TransactionSubmitter};
pub use config::{Config, ReceiptConfig};
pub use error::{Error, Result, RpcError};
pub use journal::TransferJournal;
pub use store::EntityStore;
pub use wallet::{Account, LocalKey, Network, Wallet};
