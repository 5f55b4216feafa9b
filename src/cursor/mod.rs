use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::CursorError;

pub mod sqlite;

pub use sqlite::SqliteCursor;

/// Position in the ledger: the height of the next block to process.
///
/// Only the watcher advances a cursor, one block per call. Other holders
/// may read the position at any time and see the last advanced value.
pub trait Cursor: Send + Sync {
    fn position(&self) -> Result<u64, CursorError>;

    fn advance(&self) -> Result<(), CursorError>;
}

/// In-memory cursor; clones share the same position
#[derive(Debug, Clone, Default)]
pub struct MemoryCursor {
    height: Arc<AtomicU64>,
}

impl MemoryCursor {
    pub fn new(start: u64) -> Self {
        Self {
            height: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn get(&self) -> u64 {
        self.height.load(Ordering::Acquire)
    }
}

impl Cursor for MemoryCursor {
    fn position(&self) -> Result<u64, CursorError> {
        Ok(self.get())
    }

    fn advance(&self) -> Result<(), CursorError> {
        self.height
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |height| height.checked_add(1))
            .map(|_| ())
            .map_err(CursorError::Overflow)
    }
}
