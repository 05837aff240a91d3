//! Network endpoint records

use crate::store::Record;
use crate::wallet::selection::Selectable;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A named EVM-compatible network endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub label: String,
    pub chain_id: u64,
    pub symbol: String,
    pub rpc_url: String,
    #[serde(default)]
    pub selected: bool,
}

impl Network {
    pub fn new(
        label: impl Into<String>,
        chain_id: u64,
        symbol: impl Into<String>,
        rpc_url: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            chain_id,
            symbol: symbol.into(),
            rpc_url: rpc_url.into(),
            selected: false,
        }
    }

    /// Check the record before it is persisted
    pub fn validate(&self) -> Result<()> {
        validate_rpc_url(&self.rpc_url)
    }

    /// Parsed RPC endpoint
    pub fn url(&self) -> Result<url::Url> {
        validate_rpc_url(&self.rpc_url)?;
        self.rpc_url
            .parse()
            .map_err(|e| Error::Validation(format!("invalid rpcUrl '{}': {}", self.rpc_url, e)))
    }
}

impl Record for Network {
    const COLLECTION: &'static str = "networks";

    fn label(&self) -> &str {
        &self.label
    }
}

impl Selectable for Network {
    const ROLE: &'static str = "network";
    const KIND: &'static str = "network";

    fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

fn validate_rpc_url(rpc_url: &str) -> Result<()> {
    if !rpc_url.starts_with("http://") && !rpc_url.starts_with("https://") {
        return Err(Error::Validation(format!(
            "rpcUrl must start with 'http://' or 'https://', got '{}'",
            rpc_url
        )));
    }
    url::Url::parse(rpc_url)
        .map_err(|e| Error::Validation(format!("invalid rpcUrl '{}': {}", rpc_url, e)))?;
    Ok(())
}
