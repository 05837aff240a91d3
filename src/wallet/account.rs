//! Account records

use crate::store::Record;
use crate::wallet::selection::Selectable;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A named signing account
///
/// The private key is kept in a [`SecretString`] so it never shows up in
/// `Debug` output or logs; it is only exposed when the record is persisted or
/// handed to the signer.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub label: String,
    pub public_address: String,
    #[serde(serialize_with = "expose_key", deserialize_with = "secret_key")]
    private_key: SecretString,
    /// Tracked ERC-20 contracts, in insertion order
    #[serde(default)]
    pub tokens: Vec<String>,
    #[serde(default)]
    pub selected: bool,
}

impl Account {
    pub fn new(
        label: impl Into<String>,
        public_address: impl Into<String>,
        private_key: SecretString,
    ) -> Self {
        Self {
            label: label.into(),
            public_address: public_address.into(),
            private_key,
            tokens: Vec::new(),
            selected: false,
        }
    }

    pub fn private_key(&self) -> &SecretString {
        &self.private_key
    }
}

impl Record for Account {
    const COLLECTION: &'static str = "accounts";

    fn label(&self) -> &str {
        &self.label
    }
}

impl Selectable for Account {
    const ROLE: &'static str = "acc";
    const KIND: &'static str = "account";

    fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

fn expose_key<S: Serializer>(key: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(key.expose_secret())
}

fn secret_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}
