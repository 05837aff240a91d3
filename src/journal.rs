//! Transfer journal
//!
//! Appends one JSON line per transfer lifecycle event (submitted, confirmed,
//! failed) so a transfer that was broadcast but never confirmed can still be
//! traced by its hash after the process exits.

use crate::chain::Transaction;
use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Entry in the transfer journal
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub event: &'static str,
    pub network: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub hash: Option<String>,
    pub gas_used: Option<String>,
    pub gas_price: Option<String>,
    pub error: Option<String>,
}

impl JournalEntry {
    /// Transaction accepted by the node, not yet mined
    pub fn submitted(network: &str, from: Address, to: Address, amount: U256, hash: TxHash) -> Self {
        Self {
            timestamp: Utc::now(),
            event: "submitted",
            network: network.to_string(),
            from: from.to_checksum(None),
            to: to.to_checksum(None),
            amount: amount.to_string(),
            hash: Some(hash.to_string()),
            gas_used: None,
            gas_price: None,
            error: None,
        }
    }

    /// Receipt received
    pub fn confirmed(tx: &Transaction) -> Self {
        Self {
            timestamp: Utc::now(),
            event: "confirmed",
            network: tx.network.label.clone(),
            from: tx.from.to_checksum(None),
            to: tx.to.to_checksum(None),
            amount: tx.amount.to_string(),
            hash: Some(tx.hash.to_string()),
            gas_used: Some(tx.gas_used.to_string()),
            gas_price: Some(tx.gas_price.to_string()),
            error: None,
        }
    }

    /// Broadcast transaction whose confirmation could not be observed
    pub fn failed(
        network: &str,
        from: Address,
        to: Address,
        amount: U256,
        hash: TxHash,
        error: &crate::Error,
    ) -> Self {
        Self {
            event: "failed",
            error: Some(error.to_string()),
            ..Self::submitted(network, from, to, amount, hash)
        }
    }
}

/// Writer for journal entries
struct JournalWriter {
    path: PathBuf,
}

impl JournalWriter {
    fn write(&self, entry: &JournalEntry) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// Append-only JSONL log of transfers
#[derive(Clone)]
pub struct TransferJournal {
    writer: Arc<Mutex<JournalWriter>>,
}

impl TransferJournal {
    /// Create a journal writing to `path` (JSONL format)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(JournalWriter { path: path.into() })),
        }
    }

    /// Append an entry; failures are logged and never propagated
    pub async fn record(&self, entry: JournalEntry) {
        let writer = self.writer.lock().await;
        if let Err(e) = writer.write(&entry) {
            tracing::warn!(
                path = %writer.path.display(),
                event = entry.event,
                error = %e,
                "Failed to write transfer journal"
            );
        }
    }
}

/// Read every entry back as raw JSON values
pub fn read_entries(path: &Path) -> crate::Result<Vec<serde_json::Value>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(crate::Error::from))
        .collect()
}
