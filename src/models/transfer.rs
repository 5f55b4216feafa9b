use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency tag of a transfer event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "symbol", rename_all = "lowercase")]
pub enum Currency {
    Native(String),
    Token(String),
}

impl Currency {
    pub fn symbol(&self) -> &str {
        match self {
            Currency::Native(symbol) | Currency::Token(symbol) => symbol,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Currency::Native(_))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Canonical transfer event published by the watcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub block: u64,
    pub hash: String,
    pub currency: Currency,
    /// base58check sender address
    pub sender: String,
    /// base58check receiver address
    pub receiver: String,
    /// Smallest unit of the currency. Token values wider than 128 bits do not
    /// fit and are skipped at extraction.
    pub amount: u128,
    pub fee: u64,
}
