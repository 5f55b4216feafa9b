use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::blockchain::filter::InclusionFilter;
use crate::blockchain::shutdown::Shutdown;
use crate::blockchain::LedgerApi;
use crate::codec;
use crate::error::{ApiError, CodecError, WatcherError};
use crate::logging::{LogContext, MetricsLogger};
use crate::models::{Block, ContractCall, Currency, EnrichmentInfo, LogEntry, TransferEvent};
use crate::network::NetworkParams;

/// Topic count of a canonical Transfer log: signature, sender, receiver
const TRANSFER_TOPIC_COUNT: usize = 3;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Enrichment lookup failed: {0}")]
    Api(#[from] ApiError),

    #[error("Extraction cancelled")]
    Cancelled,
}

impl From<ExtractError> for WatcherError {
    fn from(error: ExtractError) -> Self {
        match error {
            ExtractError::Api(e) if e.is_cancelled() => WatcherError::Cancelled,
            ExtractError::Api(e) => WatcherError::Api(e),
            ExtractError::Cancelled => WatcherError::Cancelled,
        }
    }
}

/// Outcome of extracting one block
#[derive(Debug, Default)]
pub struct BlockExtraction {
    pub events: Vec<TransferEvent>,
    /// Transactions that triggered an enrichment lookup
    pub enriched: usize,
    /// Rate-limit pauses taken
    pub pauses: usize,
    /// Candidates dropped because an address or amount failed to decode
    pub skipped: usize,
}

/// Turns a decoded block into canonical transfer events
pub struct TransferExtractor {
    api: Arc<dyn LedgerApi>,
    params: NetworkParams,
    filter: InclusionFilter,
    rate_limit_batch: usize,
    rate_limit_pause: Duration,
}

impl TransferExtractor {
    pub fn new(api: Arc<dyn LedgerApi>, params: NetworkParams, filter: InclusionFilter) -> Self {
        Self {
            api,
            params,
            filter,
            rate_limit_batch: 15,
            rate_limit_pause: Duration::from_secs(1),
        }
    }

    /// Pause for `pause` after every `batch` enriched transactions; 0 disables
    pub fn with_rate_limit(mut self, batch: usize, pause: Duration) -> Self {
        self.rate_limit_batch = batch;
        self.rate_limit_pause = pause;
        self
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// Extract every transfer in `block`.
    ///
    /// A failed enrichment fails the whole block, so callers never see a
    /// partial result. Decode failures only drop the affected candidate.
    pub async fn extract(&self, block: &Block, shutdown: &mut Shutdown) -> Result<BlockExtraction, ExtractError> {
        let mut extraction = BlockExtraction::default();

        for tx in &block.transactions {
            // Only the first contract entry classifies a transaction
            let call = match tx.first_call() {
                Some(call) => call,
                None => continue,
            };

            match call {
                ContractCall::NativeTransfer { owner_raw, to_raw, amount } => {
                    let (sender, receiver) = match decode_pair(owner_raw, to_raw) {
                        Ok(pair) => pair,
                        Err(e) => {
                            self.log_skip(block.height, &tx.hash, &e);
                            extraction.skipped += 1;
                            continue;
                        }
                    };

                    if !(self.filter)(&tx.hash, &sender, &receiver) {
                        continue;
                    }

                    let info = self.enrich(block.height, &tx.hash, &mut extraction, shutdown).await?;
                    extraction.events.push(TransferEvent {
                        block: block.height,
                        hash: tx.hash.clone(),
                        currency: Currency::Native(self.params.native_symbol.clone()),
                        sender,
                        receiver,
                        amount: u128::from(*amount),
                        fee: info.fee,
                    });
                }
                ContractCall::SmartContractCall { .. } => {
                    let info = self.enrich(block.height, &tx.hash, &mut extraction, shutdown).await?;
                    if !info.receipt.is_success() {
                        LogContext::new("transfer_extractor", "receipt")
                            .with_block_height(block.height)
                            .with_transaction_hash(&tx.hash)
                            .with_metadata("receipt", json!(format!("{:?}", info.receipt)))
                            .debug("Skipping contract call without a successful receipt");
                        continue;
                    }

                    for log in info.logs.iter().filter(|log| self.is_token_transfer(log)) {
                        let (sender, receiver, amount) = match self.decode_token_transfer(log) {
                            Ok(decoded) => decoded,
                            Err(e) => {
                                self.log_skip(block.height, &tx.hash, &e);
                                extraction.skipped += 1;
                                continue;
                            }
                        };

                        if !(self.filter)(&tx.hash, &sender, &receiver) {
                            continue;
                        }

                        extraction.events.push(TransferEvent {
                            block: block.height,
                            hash: tx.hash.clone(),
                            currency: Currency::Token(self.params.token_symbol.clone()),
                            sender,
                            receiver,
                            amount,
                            fee: info.fee,
                        });
                    }
                }
                ContractCall::Other { .. } => {}
            }
        }

        Ok(extraction)
    }

    /// Fetch enrichment for one transaction, pausing every `rate_limit_batch` lookups
    async fn enrich(
        &self,
        height: u64,
        hash: &str,
        extraction: &mut BlockExtraction,
        shutdown: &mut Shutdown,
    ) -> Result<EnrichmentInfo, ExtractError> {
        let info = shutdown
            .guard(self.api.transaction_detail(hash))
            .await
            .ok_or(ExtractError::Cancelled)??;
        extraction.enriched += 1;

        if self.rate_limit_batch > 0 && extraction.enriched % self.rate_limit_batch == 0 {
            MetricsLogger::log_rate_limit_pause(
                height,
                extraction.enriched,
                self.rate_limit_pause.as_millis() as u64,
            );
            shutdown
                .guard(tokio::time::sleep(self.rate_limit_pause))
                .await
                .ok_or(ExtractError::Cancelled)?;
            extraction.pauses += 1;
        }

        Ok(info)
    }

    fn is_token_transfer(&self, log: &LogEntry) -> bool {
        self.params.is_token_contract(&log.address)
            && log.topics.len() == TRANSFER_TOPIC_COUNT
            && codec::normalize_hex(&log.topics[0]) == self.params.transfer_event_signature
    }

    fn decode_token_transfer(&self, log: &LogEntry) -> Result<(String, String, u128), CodecError> {
        let sender = codec::decode_log_topic_address(&log.topics[1], self.params.version_byte)?;
        let receiver = codec::decode_log_topic_address(&log.topics[2], self.params.version_byte)?;
        let amount = codec::decode_hex_uint(&log.data)?;
        Ok((sender, receiver, amount))
    }

    fn log_skip(&self, height: u64, hash: &str, error: &CodecError) {
        LogContext::new("transfer_extractor", "decode")
            .with_block_height(height)
            .with_transaction_hash(hash)
            .with_metadata("error", json!(error.to_string()))
            .warn("Skipping transfer with undecodable fields");
    }
}

fn decode_pair(owner_raw: &str, to_raw: &str) -> Result<(String, String), CodecError> {
    Ok((codec::decode_versioned_hex(owner_raw)?, codec::decode_versioned_hex(to_raw)?))
}
