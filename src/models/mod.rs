pub mod block;
pub mod transfer;

pub use block::{Block, ContractCall, EnrichmentInfo, LogEntry, ReceiptStatus, Transaction};
pub use transfer::{Currency, TransferEvent};
