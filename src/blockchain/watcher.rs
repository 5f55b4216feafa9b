use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::blockchain::filter::InclusionFilter;
use crate::blockchain::shutdown::{self, Shutdown, ShutdownTrigger};
use crate::blockchain::transfer_extractor::TransferExtractor;
use crate::blockchain::LedgerApi;
use crate::config::WatcherConfig;
use crate::cursor::Cursor;
use crate::error::WatcherError;
use crate::logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::TransferEvent;
use crate::network::NetworkParams;

/// Ordered transfer events; closes once the watcher has stopped
pub type EventStream = mpsc::Receiver<TransferEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherState {
    /// Waiting for the next poll tick
    Idle,
    /// Processing `position` on the way to `head`
    CatchingUp { position: u64, head: u64 },
    Stopped,
}

/// Owner handle of a running watcher
pub struct WatcherHandle {
    trigger: ShutdownTrigger,
    state: watch::Receiver<WatcherState>,
    task: JoinHandle<Result<(), WatcherError>>,
}

impl WatcherHandle {
    /// Request a stop; the event stream closes once the task has wound down
    pub fn stop(&self) {
        LogContext::new("watcher", "stop").info("Stop requested");
        self.trigger.trigger();
    }

    pub fn state(&self) -> WatcherState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WatcherState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the watcher to stop and return why it stopped.
    ///
    /// A requested stop, a passed deadline or a dropped event stream all
    /// return `Ok(())`.
    pub async fn join(self) -> Result<(), WatcherError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(WatcherError::Task(e.to_string())),
        }
    }

    /// Stop and wait
    pub async fn shutdown(self) -> Result<(), WatcherError> {
        self.stop();
        self.join().await
    }
}

/// Catch-up controller: polls the head and walks the cursor towards it one block at a time
pub struct Watcher {
    api: Arc<dyn LedgerApi>,
    cursor: Arc<dyn Cursor>,
    extractor: TransferExtractor,
    config: WatcherConfig,
    events: mpsc::Sender<TransferEvent>,
    state: watch::Sender<WatcherState>,
    shutdown: Shutdown,
}

impl Watcher {
    /// Start a watcher task on the current runtime.
    ///
    /// The stream is bounded by `config.channel_capacity`; a full stream
    /// blocks the task, so a slow consumer stalls scanning.
    pub fn spawn(
        api: Arc<dyn LedgerApi>,
        cursor: Arc<dyn Cursor>,
        filter: InclusionFilter,
        params: NetworkParams,
        config: WatcherConfig,
    ) -> (WatcherHandle, EventStream) {
        let (events, stream) = mpsc::channel(config.channel_capacity.max(1));
        let (state, state_rx) = watch::channel(WatcherState::Idle);

        let (trigger, mut shutdown) = shutdown::channel();
        if let Some(deadline) = config.deadline() {
            shutdown = shutdown.with_deadline(Instant::now() + deadline);
        }

        let extractor = TransferExtractor::new(Arc::clone(&api), params, filter)
            .with_rate_limit(config.rate_limit_batch, config.rate_limit_pause());

        let watcher = Watcher {
            api,
            cursor,
            extractor,
            config,
            events,
            state,
            shutdown,
        };
        let task = tokio::spawn(watcher.run());

        (
            WatcherHandle {
                trigger,
                state: state_rx,
                task,
            },
            stream,
        )
    }

    async fn run(mut self) -> Result<(), WatcherError> {
        let params = self.extractor.params();
        LogContext::new("watcher", "start")
            .with_metadata("network", json!(params.network.as_str()))
            .with_metadata("poll_interval_ms", json!(self.config.poll_interval_ms))
            .with_metadata("catch_up_batch_cap", json!(self.config.catch_up_batch_cap))
            .info("Starting watcher");

        let result = match self.watch().await {
            Err(e) if e.is_cancelled() => Ok(()),
            other => other,
        };

        match &result {
            Ok(()) => LogContext::new("watcher", "stop").info("Watcher stopped"),
            Err(e) => ErrorLogger::log_error(e, Some(LogContext::new("watcher", "stop"))),
        }

        self.state.send_replace(WatcherState::Stopped);
        result
    }

    async fn watch(&mut self) -> Result<(), WatcherError> {
        let mut failures: u32 = 0;

        loop {
            match self.tick().await {
                Ok(()) => failures = 0,
                Err(e) if e.is_cancelled() => return Err(e),
                // Remote failures are retried on the next tick
                Err(e @ WatcherError::Api(_)) => {
                    failures += 1;
                    ErrorLogger::log_error(
                        &e,
                        Some(LogContext::new("watcher", "tick").with_retry_count(failures)),
                    );

                    let limit = self.config.max_consecutive_failures;
                    if limit > 0 && failures >= limit {
                        return Err(WatcherError::RetriesExhausted {
                            attempts: failures,
                            last: Box::new(e),
                        });
                    }
                }
                Err(e) => return Err(e),
            }

            self.set_state(WatcherState::Idle);
            if self.shutdown.guard(sleep(self.config.poll_interval())).await.is_none() {
                return Err(WatcherError::Cancelled);
            }
        }
    }

    /// One poll: read the head, then process blocks up to it (bounded by the batch cap)
    async fn tick(&mut self) -> Result<(), WatcherError> {
        let head = self
            .shutdown
            .guard(self.api.head())
            .await
            .ok_or(WatcherError::Cancelled)??;

        let mut position = self.cursor.position()?;
        if head == 0 || position >= head {
            return Ok(());
        }

        MetricsLogger::log_catch_up_status(position, head);

        let cap = self.config.catch_up_batch_cap;
        let mut processed: u64 = 0;
        while position < head {
            if cap > 0 && processed >= cap {
                LogContext::new("watcher", "catch_up")
                    .with_metadata("position", json!(position))
                    .with_metadata("head", json!(head))
                    .debug("Batch cap reached, continuing next tick");
                break;
            }

            self.set_state(WatcherState::CatchingUp { position, head });
            self.process_block(position).await?;

            self.cursor.advance()?;
            position = self.cursor.position()?;
            processed += 1;
        }

        Ok(())
    }

    /// Fetch, extract and publish one block; events go out only after the whole block extracted
    async fn process_block(&mut self, height: u64) -> Result<(), WatcherError> {
        let monitor = PerformanceMonitor::new("process_block").with_metadata("height", json!(height));

        let block = self
            .shutdown
            .guard(self.api.block_by_height(height))
            .await
            .ok_or(WatcherError::Cancelled)??;

        let extraction = self.extractor.extract(&block, &mut self.shutdown).await?;
        let event_count = extraction.events.len();

        for event in extraction.events {
            self.publish(event).await?;
        }

        MetricsLogger::log_block_processed(height, event_count, extraction.enriched, monitor.elapsed_ms());
        if extraction.skipped > 0 {
            LogContext::new("watcher", "process_block")
                .with_block_height(height)
                .with_metadata("skipped", json!(extraction.skipped))
                .warn("Some transfers were skipped");
        }

        Ok(())
    }

    async fn publish(&mut self, event: TransferEvent) -> Result<(), WatcherError> {
        match self.shutdown.guard(self.events.send(event)).await {
            Some(Ok(())) => Ok(()),
            Some(Err(_)) => {
                LogContext::new("watcher", "publish").info("Event stream dropped by consumer");
                Err(WatcherError::Cancelled)
            }
            None => Err(WatcherError::Cancelled),
        }
    }

    fn set_state(&self, state: WatcherState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}
