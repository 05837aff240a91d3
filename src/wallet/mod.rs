//! Accounts, networks and the active selection
//!
//! [`Wallet`] is the entry point used by the CLI. It owns the entity store
//! and routes every mutation through the [`SelectionManager`] so the
//! single-selection invariant holds for both collections.

mod account;
mod network;
pub mod selection;
mod signer;

pub use account::Account;
pub use network::Network;
pub use selection::{Selectable, SelectionManager};
pub use signer::LocalKey;

use crate::config::Config;
use crate::store::EntityStore;
use crate::{Error, Result};
use alloy::primitives::Address;
use std::str::FromStr;

/// Label-keyed account and network registry
#[derive(Debug)]
pub struct Wallet {
    store: EntityStore,
}

impl Wallet {
    /// Open the wallet store in the configured data directory
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self::new(EntityStore::open(&config.data_dir)?))
    }

    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    fn selection(&self) -> SelectionManager<'_> {
        SelectionManager::new(&self.store)
    }

    /// Generate a new key pair, store it under `label` and select it
    pub fn create_account(&self, label: &str) -> Result<Account> {
        validate_label(label)?;
        let key = LocalKey::generate();
        let account = Account::new(label, key.address_string(), key.private_key_hex());
        let account = self.selection().insert_and_select(&account)?;
        tracing::info!(label = %label, address = %account.public_address, "Created account");
        Ok(account)
    }

    /// Store an existing private key under `label` and select it
    pub fn import_account(&self, label: &str, private_key: &str) -> Result<Account> {
        validate_label(label)?;
        let key = LocalKey::from_hex(private_key)?;
        let account = Account::new(label, key.address_string(), key.private_key_hex());
        let account = self.selection().insert_and_select(&account)?;
        tracing::info!(label = %label, address = %account.public_address, "Imported account");
        Ok(account)
    }

    pub fn account(&self, label: &str) -> Result<Account> {
        self.selection().get(label)
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        self.selection().list()
    }

    pub fn remove_account(&self, label: &str) -> Result<()> {
        self.selection().remove::<Account>(label)
    }

    pub fn select_account(&self, label: &str) -> Result<Account> {
        self.selection().select(label)
    }

    pub fn selected_account(&self) -> Result<Account> {
        self.selection().selected()
    }

    /// Track an ERC-20 contract on an account
    ///
    /// Addresses are stored checksummed; adding one that is already tracked
    /// leaves the list unchanged.
    pub fn add_token(&self, label: &str, token: &str) -> Result<Account> {
        let token = Address::from_str(token.trim())
            .map_err(|e| Error::Validation(format!("invalid token address '{}': {}", token, e)))?;

        self.store.atomic(|txn| {
            let mut account: Account = txn.get(label)?;
            let already_tracked = account
                .tokens
                .iter()
                .any(|t| Address::from_str(t).map(|a| a == token).unwrap_or(false));
            if !already_tracked {
                account.tokens.push(token.to_checksum(None));
                txn.upsert(&account)?;
            }
            Ok(())
        })?;

        tracing::info!(label = %label, token = %token, "Tracking token");
        self.account(label)
    }

    /// Validate, store and select a network
    pub fn add_network(&self, network: Network) -> Result<Network> {
        validate_label(&network.label)?;
        network.validate()?;
        self.selection().insert_and_select(&network)
    }

    pub fn network(&self, label: &str) -> Result<Network> {
        self.selection().get(label)
    }

    pub fn list_networks(&self) -> Result<Vec<Network>> {
        self.selection().list()
    }

    pub fn remove_network(&self, label: &str) -> Result<()> {
        self.selection().remove::<Network>(label)
    }

    pub fn select_network(&self, label: &str) -> Result<Network> {
        self.selection().select(label)
    }

    pub fn selected_network(&self) -> Result<Network> {
        self.selection().selected()
    }
}

fn validate_label(label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(Error::Validation("label must not be empty".to_string()));
    }
    Ok(())
}
