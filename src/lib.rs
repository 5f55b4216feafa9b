pub mod blockchain;
pub mod cli;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod error;
pub mod logging;
pub mod models;
pub mod network;
pub mod retry;

pub use blockchain::{EventStream, InclusionFilter, LedgerApi, TronGridClient, Watcher, WatcherHandle, WatcherState};
pub use config::{AppConfig, ApiConfig, CursorConfig, LoggingConfig, NetworkConfig, WatcherConfig};
pub use cursor::{Cursor, MemoryCursor, SqliteCursor};
pub use error::{ApiError, CodecError, ConfigError, CursorError, Result, WatcherError};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use models::{Currency, TransferEvent};
pub use network::{Network, NetworkParams};
pub use retry::{RetryConfig, RetryManager};
