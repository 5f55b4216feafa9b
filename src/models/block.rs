use serde::{Deserialize, Serialize};

/// A fetched ledger block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub id: String,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub calls: Vec<ContractCall>,
}

impl Transaction {
    /// The call that classifies the transaction.
    ///
    /// Only the first entry counts, even when a transaction carries several.
    pub fn first_call(&self) -> Option<&ContractCall> {
        self.calls.first()
    }
}

/// One contract entry of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContractCall {
    /// Native currency transfer; addresses are versioned hex
    NativeTransfer {
        owner_raw: String,
        to_raw: String,
        amount: u64,
    },
    SmartContractCall {
        contract_address: String,
        call_data: String,
    },
    Other {
        contract_type: String,
    },
}

/// Fee, receipt and logs of a single transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentInfo {
    pub fee: u64,
    pub receipt: ReceiptStatus,
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Failed(String),
    /// No receipt result reported (native transfers, unknown transactions)
    Missing,
}

impl ReceiptStatus {
    pub fn from_result(result: Option<&str>) -> Self {
        match result {
            Some("SUCCESS") => ReceiptStatus::Success,
            Some(other) => ReceiptStatus::Failed(other.to_string()),
            None => ReceiptStatus::Missing,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ReceiptStatus::Success)
    }
}

/// Contract event log entry: hex address, 32-byte hex topics, hex data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}
