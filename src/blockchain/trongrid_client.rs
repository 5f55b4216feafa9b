use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::blockchain::LedgerApi;
use crate::codec;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{Block, ContractCall, EnrichmentInfo, LogEntry, ReceiptStatus, Transaction};
use crate::network::NetworkParams;
use crate::retry::{RetryConfig, RetryManager};

const API_KEY_HEADER: &str = "TRON-PRO-API-KEY";

const NATIVE_TRANSFER_TYPE: &str = "TransferContract";
const SMART_CONTRACT_TYPE: &str = "TriggerSmartContract";

const BALANCE_OF_SELECTOR: &str = "balanceOf(address)";

#[derive(Debug, Default, Deserialize)]
struct WireBlock {
    #[serde(rename = "blockID", default)]
    block_id: Option<String>,
    #[serde(default)]
    block_header: Option<WireBlockHeader>,
    #[serde(default)]
    transactions: Vec<WireTransaction>,
}

#[derive(Debug, Deserialize)]
struct WireBlockHeader {
    raw_data: WireHeaderRaw,
}

#[derive(Debug, Deserialize)]
struct WireHeaderRaw {
    #[serde(default)]
    number: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireTransaction {
    #[serde(rename = "txID")]
    tx_id: String,
    #[serde(default)]
    raw_data: Option<WireTransactionRaw>,
}

#[derive(Debug, Deserialize)]
struct WireTransactionRaw {
    #[serde(default)]
    contract: Vec<WireContract>,
}

#[derive(Debug, Deserialize)]
struct WireContract {
    #[serde(rename = "type")]
    contract_type: String,
    #[serde(default)]
    parameter: Option<WireParameter>,
}

#[derive(Debug, Deserialize)]
struct WireParameter {
    #[serde(default)]
    value: WireContractValue,
}

#[derive(Debug, Default, Deserialize)]
struct WireContractValue {
    #[serde(default)]
    amount: Option<u64>,
    #[serde(default)]
    owner_address: Option<String>,
    #[serde(default)]
    to_address: Option<String>,
    #[serde(default)]
    contract_address: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireTransactionInfo {
    #[serde(default)]
    fee: Option<u64>,
    #[serde(default)]
    receipt: Option<WireReceipt>,
    #[serde(default)]
    log: Vec<WireLog>,
}

#[derive(Debug, Deserialize)]
struct WireReceipt {
    #[serde(default)]
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireLog {
    #[serde(default)]
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Default, Deserialize)]
struct WireAccount {
    #[serde(default)]
    balance: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireConstantCall {
    #[serde(default)]
    result: Option<WireCallResult>,
    #[serde(default)]
    constant_result: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireCallResult {
    #[serde(default)]
    result: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct ConstantCallRequest<'a> {
    owner_address: &'a str,
    contract_address: &'a str,
    function_selector: &'a str,
    parameter: String,
    visible: bool,
}

impl WireBlock {
    fn height(&self) -> Option<u64> {
        self.block_header.as_ref().and_then(|header| header.raw_data.number)
    }

    fn into_block(self) -> Result<Block, ApiError> {
        let height = self
            .height()
            .ok_or_else(|| ApiError::InvalidResponse("Block header has no number".to_string()))?;
        let id = self.block_id.unwrap_or_default();

        let transactions: Vec<Transaction> = self
            .transactions
            .into_iter()
            .map(WireTransaction::into_transaction)
            .collect();

        Ok(Block { height, id, transactions })
    }
}

impl WireTransaction {
    fn into_transaction(self) -> Transaction {
        let calls: Vec<ContractCall> = self
            .raw_data
            .map(|raw| raw.contract.into_iter().map(WireContract::into_call).collect())
            .unwrap_or_default();

        Transaction { hash: self.tx_id, calls }
    }
}

impl WireContract {
    fn into_call(self) -> ContractCall {
        let value = self.parameter.map(|p| p.value).unwrap_or_default();

        match self.contract_type.as_str() {
            NATIVE_TRANSFER_TYPE => ContractCall::NativeTransfer {
                owner_raw: value.owner_address.unwrap_or_default(),
                to_raw: value.to_address.unwrap_or_default(),
                amount: value.amount.unwrap_or(0),
            },
            SMART_CONTRACT_TYPE => ContractCall::SmartContractCall {
                contract_address: value.contract_address.unwrap_or_default(),
                call_data: value.data.unwrap_or_default(),
            },
            _ => ContractCall::Other {
                contract_type: self.contract_type,
            },
        }
    }
}

impl From<WireTransactionInfo> for EnrichmentInfo {
    fn from(info: WireTransactionInfo) -> Self {
        EnrichmentInfo {
            fee: info.fee.unwrap_or(0),
            receipt: ReceiptStatus::from_result(info.receipt.as_ref().and_then(|r| r.result.as_deref())),
            logs: info
                .log
                .into_iter()
                .map(|log| LogEntry {
                    address: log.address,
                    topics: log.topics,
                    data: log.data,
                })
                .collect(),
        }
    }
}

/// TronGrid HTTP client
#[derive(Clone)]
pub struct TronGridClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
    timeout_seconds: u64,
}

impl TronGridClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, ApiError> {
        let config = ApiConfig {
            endpoint: Some(base_url.to_string()),
            api_key,
            ..ApiConfig::default()
        };
        Self::with_config(&config, base_url)
    }

    /// Build a client for the configured network, honoring an endpoint override
    pub fn from_config(config: &ApiConfig, params: &NetworkParams) -> Result<Self, ApiError> {
        let base_url = config.endpoint.as_deref().unwrap_or(&params.api_base_url);
        Self::with_config(config, base_url)
    }

    fn with_config(config: &ApiConfig, base_url: &str) -> Result<Self, ApiError> {
        let context = LogContext::new("trongrid_client", "initialization")
            .with_metadata("endpoint", json!(base_url))
            .with_metadata("timeout_seconds", json!(config.timeout_seconds))
            .with_metadata("api_key", json!(config.api_key.is_some()));
        context.info("Initializing TronGrid client");

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            retry: RetryConfig::from(config),
            timeout_seconds: config.timeout_seconds,
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout { seconds: self.timeout_seconds }
            } else {
                ApiError::Http(e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let seconds = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimit { seconds });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status: status.as_u16(), body });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// POST `body` to `path` with retry, timing and metrics
    async fn post<B, T>(&self, method: &str, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        LogContext::new("trongrid_client", "post")
            .with_metadata("method", json!(method))
            .trace(&format!("POST {}", url));

        RetryManager::new(method, self.retry.clone())
            .execute(|| async {
                let monitor = PerformanceMonitor::new(method);
                let result = self.send(self.client.post(&url).json(body)).await;
                let duration = monitor.finish_with_result(&result);
                MetricsLogger::log_api_call(method, duration, result.is_ok());
                result
            })
            .await
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);

        RetryManager::new(method, self.retry.clone())
            .execute(|| async {
                let monitor = PerformanceMonitor::new(method);
                let result = self.send(self.client.get(&url)).await;
                let duration = monitor.finish_with_result(&result);
                MetricsLogger::log_api_call(method, duration, result.is_ok());
                result
            })
            .await
    }

    /// Native balance of a base58check address, 0 for unactivated accounts
    pub async fn balance(&self, address: &str) -> Result<u64, ApiError> {
        codec::decode_address(address)?;
        LogContext::new("trongrid_client", "balance")
            .with_address(address)
            .debug("Querying native balance");

        let account: WireAccount = self
            .post("getaccount", "/wallet/getaccount", &json!({ "address": address, "visible": true }))
            .await?;

        Ok(account.balance.unwrap_or(0))
    }

    /// Token balance of `owner` on the token `contract`, via a constant call
    pub async fn token_balance(&self, owner: &str, contract: &str) -> Result<u128, ApiError> {
        let request = ConstantCallRequest {
            owner_address: owner,
            contract_address: contract,
            function_selector: BALANCE_OF_SELECTOR,
            parameter: codec::abi_encode_address(owner)?,
            visible: true,
        };
        LogContext::new("trongrid_client", "token_balance")
            .with_address(owner)
            .with_metadata("contract", json!(contract))
            .debug("Querying token balance");

        let call: WireConstantCall = self
            .post("triggerconstantcontract", "/walletsolidity/triggerconstantcontract", &request)
            .await?;

        if let Some(result) = &call.result {
            if !result.result {
                let message = result.message.as_deref().map(decode_call_message).unwrap_or_default();
                return Err(ApiError::InvalidResponse(format!("Constant call rejected: {}", message)));
            }
        }

        let word = call
            .constant_result
            .first()
            .ok_or_else(|| ApiError::InvalidResponse("Constant call returned no result".to_string()))?;

        Ok(codec::decode_hex_uint(word)?)
    }
}

/// Rejection messages come back hex-encoded
fn decode_call_message(message: &str) -> String {
    hex::decode(message)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| message.to_string())
}

#[async_trait]
impl LedgerApi for TronGridClient {
    async fn head(&self) -> Result<u64, ApiError> {
        let block: WireBlock = self.get("getnowblock", "/walletsolidity/getnowblock").await?;
        Ok(block.height().unwrap_or(0))
    }

    async fn block_by_height(&self, height: u64) -> Result<Block, ApiError> {
        let block: WireBlock = self
            .post("getblockbynum", "/walletsolidity/getblockbynum", &json!({ "num": height }))
            .await?;

        if block.block_header.is_none() {
            return Err(ApiError::NotFound(format!("block {}", height)));
        }

        let block = block.into_block()?;
        if block.height != height {
            return Err(ApiError::InvalidResponse(format!(
                "Requested block {} but received {}",
                height, block.height
            )));
        }
        Ok(block)
    }

    async fn transaction_detail(&self, hash: &str) -> Result<EnrichmentInfo, ApiError> {
        let info: WireTransactionInfo = self
            .post(
                "gettransactioninfobyid",
                "/walletsolidity/gettransactioninfobyid",
                &json!({ "value": hash }),
            )
            .await?;

        Ok(info.into())
    }
}
