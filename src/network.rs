use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::codec::{self, TRANSFER_EVENT_SIGNATURE};
use crate::error::ConfigError;

/// Ledger network the watcher is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[serde(alias = "shasta")]
    Testnet,
}

impl Default for Network {
    fn default() -> Self {
        Network::Mainnet
    }
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" | "shasta" => Ok(Network::Testnet),
            other => Err(ConfigError::InvalidValue {
                key: "network".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Per-network constants, injected into the client and the extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub network: Network,
    pub api_base_url: String,
    /// Address version marker prepended to 20-byte payloads
    pub version_byte: u8,
    /// Token contract address (base58check)
    pub token_contract: String,
    /// Token contract payload as lowercase hex, the form enrichment logs carry
    pub token_contract_hex: String,
    pub token_symbol: String,
    pub native_symbol: String,
    /// Lowercase hex keccak-256 of the Transfer event signature
    pub transfer_event_signature: String,
}

pub const MAINNET_API_URL: &str = "https://api.trongrid.io";
pub const TESTNET_API_URL: &str = "https://api.shasta.trongrid.io";

pub const MAINNET_TOKEN_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
pub const TESTNET_TOKEN_CONTRACT: &str = "TG3XXyExBkPp9nzdajDZsozEu4BkaSJozs";

pub const MAINNET_TOKEN_CONTRACT_HEX: &str = "a614f803b6fd780986a42c78ec9c7f77e6ded13c";
pub const TESTNET_TOKEN_CONTRACT_HEX: &str = "42a1e39aefa49290f2b3f9ed688d7cecf86cd6e0";

/// Shasta reuses the mainnet marker
pub const ADDRESS_VERSION_BYTE: u8 = 0x41;

pub const NATIVE_SYMBOL: &str = "TRX";
pub const TOKEN_SYMBOL: &str = "TRON_USDT";

impl NetworkParams {
    pub fn for_network(network: Network) -> Self {
        let (api_base_url, token_contract, token_contract_hex) = match network {
            Network::Mainnet => (MAINNET_API_URL, MAINNET_TOKEN_CONTRACT, MAINNET_TOKEN_CONTRACT_HEX),
            Network::Testnet => (TESTNET_API_URL, TESTNET_TOKEN_CONTRACT, TESTNET_TOKEN_CONTRACT_HEX),
        };

        Self {
            network,
            api_base_url: api_base_url.to_string(),
            version_byte: ADDRESS_VERSION_BYTE,
            token_contract: token_contract.to_string(),
            token_contract_hex: token_contract_hex.to_string(),
            token_symbol: TOKEN_SYMBOL.to_string(),
            native_symbol: NATIVE_SYMBOL.to_string(),
            transfer_event_signature: TRANSFER_EVENT_SIGNATURE.clone(),
        }
    }

    /// Replace the token contract, keeping the hex form consistent with it
    pub fn with_token_contract(mut self, address: &str) -> Result<Self, ConfigError> {
        let raw = codec::decode_address(address).map_err(|e| ConfigError::InvalidValue {
            key: "network.token_contract".to_string(),
            value: format!("{} ({})", address, e),
        })?;
        self.token_contract = address.trim().to_string();
        self.token_contract_hex = hex::encode(raw.payload);
        Ok(self)
    }

    /// Does a log entry address refer to the configured token contract?
    ///
    /// Logs carry the bare 20-byte hex payload; a versioned 21-byte form is
    /// accepted too.
    pub fn is_token_contract(&self, log_address: &str) -> bool {
        let normalized = codec::normalize_hex(log_address);
        if !normalized.bytes().all(|b| b.is_ascii_hexdigit()) {
            return false;
        }

        match normalized.len() {
            40 => normalized == self.token_contract_hex,
            42 => {
                let version = format!("{:02x}", self.version_byte);
                normalized.get(..2) == Some(version.as_str())
                    && normalized.get(2..) == Some(self.token_contract_hex.as_str())
            }
            _ => false,
        }
    }
}
