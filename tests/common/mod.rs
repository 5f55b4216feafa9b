#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tron_transfer_watcher::error::ApiError;
use tron_transfer_watcher::models::{Block, ContractCall, EnrichmentInfo, LogEntry, ReceiptStatus, Transaction};
use tron_transfer_watcher::network::{Network, NetworkParams};
use tron_transfer_watcher::LedgerApi;

pub const USDT_HEX: &str = "a614f803b6fd780986a42c78ec9c7f77e6ded13c";
pub const USDT_ADDRESS: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
pub const ZERO_HEX: &str = "0000000000000000000000000000000000000000";
pub const ZERO_ADDRESS: &str = "T9yD14Nj9j7xAB4dbGeiX9h8unkKHxuWwb";

/// In-process ledger with scripted blocks, details and failures
#[derive(Default)]
pub struct ScriptedLedger {
    head: AtomicU64,
    head_failures: AtomicU32,
    blocks: Mutex<HashMap<u64, Block>>,
    details: Mutex<HashMap<String, EnrichmentInfo>>,
    block_failures: Mutex<HashMap<u64, u32>>,
    detail_failures: Mutex<HashMap<String, u32>>,
    pub block_calls: Mutex<Vec<u64>>,
    pub detail_calls: Mutex<Vec<String>>,
}

impl ScriptedLedger {
    pub fn new(head: u64) -> Self {
        let ledger = Self::default();
        ledger.set_head(head);
        ledger
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    /// Fail the next `times` head requests with a 503
    pub fn fail_head(&self, times: u32) {
        self.head_failures.store(times, Ordering::SeqCst);
    }

    pub fn add_block(&self, height: u64, transactions: Vec<Transaction>) {
        self.blocks.lock().unwrap().insert(
            height,
            Block {
                height,
                id: format!("{:064x}", height),
                transactions,
            },
        );
    }

    pub fn add_detail(&self, hash: &str, info: EnrichmentInfo) {
        self.details.lock().unwrap().insert(hash.to_string(), info);
    }

    pub fn fail_block(&self, height: u64, times: u32) {
        self.block_failures.lock().unwrap().insert(height, times);
    }

    pub fn fail_detail(&self, hash: &str, times: u32) {
        self.detail_failures.lock().unwrap().insert(hash.to_string(), times);
    }

    pub fn detail_call_count(&self) -> usize {
        self.detail_calls.lock().unwrap().len()
    }

    fn take_failure<K: std::hash::Hash + Eq>(failures: &Mutex<HashMap<K, u32>>, key: &K) -> bool {
        let mut failures = failures.lock().unwrap();
        match failures.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

fn unavailable() -> ApiError {
    ApiError::Status {
        status: 503,
        body: "service unavailable".to_string(),
    }
}

#[async_trait]
impl LedgerApi for ScriptedLedger {
    async fn head(&self) -> Result<u64, ApiError> {
        let failing = self
            .head_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(unavailable());
        }
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn block_by_height(&self, height: u64) -> Result<Block, ApiError> {
        self.block_calls.lock().unwrap().push(height);
        if Self::take_failure(&self.block_failures, &height) {
            return Err(unavailable());
        }

        Ok(self.blocks.lock().unwrap().get(&height).cloned().unwrap_or(Block {
            height,
            id: format!("{:064x}", height),
            transactions: vec![],
        }))
    }

    async fn transaction_detail(&self, hash: &str) -> Result<EnrichmentInfo, ApiError> {
        self.detail_calls.lock().unwrap().push(hash.to_string());
        if Self::take_failure(&self.detail_failures, &hash.to_string()) {
            return Err(ApiError::Timeout { seconds: 30 });
        }

        Ok(self.details.lock().unwrap().get(hash).cloned().unwrap_or(EnrichmentInfo {
            fee: 0,
            receipt: ReceiptStatus::Missing,
            logs: vec![],
        }))
    }
}

pub fn mainnet() -> NetworkParams {
    NetworkParams::for_network(Network::Mainnet)
}

/// 32-byte topic word holding a 20-byte payload
pub fn topic(payload_hex: &str) -> String {
    format!("{:0>64}", payload_hex)
}

pub fn native_tx(hash: &str, owner_payload: &str, to_payload: &str, amount: u64) -> Transaction {
    Transaction {
        hash: hash.to_string(),
        calls: vec![ContractCall::NativeTransfer {
            owner_raw: format!("41{}", owner_payload),
            to_raw: format!("41{}", to_payload),
            amount,
        }],
    }
}

pub fn contract_tx(hash: &str) -> Transaction {
    Transaction {
        hash: hash.to_string(),
        calls: vec![ContractCall::SmartContractCall {
            contract_address: format!("41{}", USDT_HEX),
            call_data: "a9059cbb".to_string(),
        }],
    }
}

pub fn transfer_log(params: &NetworkParams, sender_payload: &str, receiver_payload: &str, amount: u128) -> LogEntry {
    LogEntry {
        address: params.token_contract_hex.clone(),
        topics: vec![
            params.transfer_event_signature.clone(),
            topic(sender_payload),
            topic(receiver_payload),
        ],
        data: format!("{:064x}", amount),
    }
}

pub fn receipt(fee: u64, status: ReceiptStatus, logs: Vec<LogEntry>) -> EnrichmentInfo {
    EnrichmentInfo {
        fee,
        receipt: status,
        logs,
    }
}

/// Poll `condition` on the tokio clock until it holds, panicking after `limit`
pub async fn wait_until<F: Fn() -> bool>(condition: F, limit: Duration) {
    tokio::time::timeout(limit, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
