pub mod filter;
pub mod ledger_api;
pub mod shutdown;
pub mod transfer_extractor;
pub mod trongrid_client;
pub mod watcher;

pub use filter::{accept_all, watch_addresses, InclusionFilter};
pub use ledger_api::LedgerApi;
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use transfer_extractor::{BlockExtraction, ExtractError, TransferExtractor};
pub use trongrid_client::TronGridClient;
pub use watcher::{EventStream, Watcher, WatcherHandle, WatcherState};
