use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::{Block, EnrichmentInfo};

/// Remote ledger the watcher reads from.
///
/// Implementations report cancellation as [`ApiError::Cancelled`] so the
/// watcher can tell a deliberate stop apart from a failed call.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Current chain head height, 0 when unavailable
    async fn head(&self) -> Result<u64, ApiError>;

    async fn block_by_height(&self, height: u64) -> Result<Block, ApiError>;

    /// Fee, receipt and logs of a single transaction
    async fn transaction_detail(&self, hash: &str) -> Result<EnrichmentInfo, ApiError>;
}
