//! Error types for the wallet

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by the JSON-RPC endpoint, tagged with the method that failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{method} failed: {message}")]
pub struct RpcError {
    pub method: &'static str,
    pub message: String,
}

impl RpcError {
    pub fn new(method: &'static str, message: impl ToString) -> Self {
        Self {
            method,
            message: message.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{collection} entry '{label}' not found")]
    NotFound {
        collection: &'static str,
        label: String,
    },

    #[error("{collection} entry '{label}' already exists")]
    AlreadyExists {
        collection: &'static str,
        label: String,
    },

    #[error("no {0} selected")]
    NothingSelected(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Failed to connect to RPC endpoint: {0}")]
    Connection(String),

    #[error("RPC error: {0}")]
    Rpc(RpcError),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Broadcast rejected: {0}")]
    Broadcast(RpcError),

    #[error("Receipt query failed: {0}")]
    Receipt(RpcError),

    #[error("Transaction {hash} not confirmed after {waited:?}")]
    ReceiptTimeout { hash: String, waited: Duration },

    #[error("Confirmation of transaction {hash} was cancelled")]
    Cancelled { hash: String },

    #[error("Wallet store at {0} is in use by another process")]
    StoreLocked(PathBuf),

    #[error("Storage error: {0}")]
    Storage(#[from] heed::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
