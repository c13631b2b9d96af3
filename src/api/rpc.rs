// ============================================================================
// API Client : JSON-RPC Ethereum
// ============================================================================
// Implémente `LogSource` au-dessus d'un noeud JSON-RPC HTTP, plus les
// lectures de vues (eth_call) pour les vues Rewards et Wrap.
//
// CONCEPTS RUST :
// 1. Generics + DeserializeOwned : une seule fonction `call` pour toutes
//    les méthodes, le type de `result` est choisi par l'appelant
// 2. AtomicU64 : compteur d'id de requête sans &mut self
// 3. tokio::try_join! : plusieurs eth_call en parallèle, première erreur gagnante
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, instrument};

use crate::api::abi::{
    self, ALLOWANCE_SELECTOR, BALANCE_OF_SELECTOR, CONTRIBUTIONS_SELECTOR, LOCKED_FUNDS_SELECTOR,
};
use crate::api::{BlockInfo, LogEntry, LogFilter, LogSource};
use crate::error::ChainError;
use crate::models::{AccountFunds, WalletBalances};

/// Décimales des vues lockedFunds / contributions (gwei)
const GWEI_DECIMALS: u32 = 9;

// ============================================================================
// Structures pour parser les réponses JSON-RPC
// ============================================================================

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Log tel que renvoyé par eth_getLogs (quantités en hexadécimal)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLog {
    block_number: String,
    #[serde(default)]
    log_index: Option<String>,
    topics: Vec<String>,
    data: String,
}

impl RawLog {
    fn into_entry(self) -> Result<LogEntry, ChainError> {
        Ok(LogEntry {
            block_number: abi::parse_quantity(&self.block_number)?,
            log_index: self
                .log_index
                .as_deref()
                .map(abi::parse_quantity)
                .transpose()?
                .unwrap_or(0),
            topics: self.topics.into_iter().map(|t| t.to_lowercase()).collect(),
            data: abi::decode_hex(&self.data)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    number: String,
    timestamp: String,
}

// ============================================================================
// Client
// ============================================================================

/// Client JSON-RPC HTTP
pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("candlewatch/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Envoie une requête JSON-RPC et extrait `result`
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = request_body(id, method, params);

        debug!(method, id, "Sending JSON-RPC request");
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: RpcResponse<T> = response.json().await?;
        unwrap_response(method, parsed)
    }

    /// Exécute un eth_call sur le bloc courant et renvoie les octets bruts
    async fn call_view(&self, contract: &str, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let raw: String = self.call("eth_call", view_call_params(contract, data)).await?;
        abi::decode_hex(&raw)
    }

    /// Appelle une vue `fn(address) returns (uint256, ...)` et décode le premier mot
    async fn call_address_view(
        &self,
        contract: &str,
        selector: [u8; 4],
        address: &[u8; 20],
    ) -> Result<f64, ChainError> {
        let bytes = self
            .call_view(contract, &abi::encode_address_call(selector, address))
            .await?;
        Ok(abi::format_units(abi::word(&bytes, 0)?, GWEI_DECIMALS))
    }

    /// Fonds verrouillés et contributions d'une adresse
    #[instrument(skip(self, address))]
    pub async fn account_funds(
        &self,
        contract: &str,
        address: &[u8; 20],
    ) -> Result<AccountFunds, ChainError> {
        let (locked, contributions) = tokio::try_join!(
            self.call_address_view(contract, LOCKED_FUNDS_SELECTOR, address),
            self.call_address_view(contract, CONTRIBUTIONS_SELECTOR, address),
        )?;

        Ok(AccountFunds::new(locked, contributions))
    }

    /// ERC-20 balanceOf(owner), en unités brutes
    pub async fn balance_of(&self, token: &str, owner: &[u8; 20]) -> Result<u128, ChainError> {
        let bytes = self
            .call_view(token, &abi::encode_address_call(BALANCE_OF_SELECTOR, owner))
            .await?;
        Ok(abi::raw_units(abi::word(&bytes, 0)?))
    }

    /// ERC-20 allowance(owner, spender), en unités brutes
    pub async fn allowance(
        &self,
        token: &str,
        owner: &[u8; 20],
        spender: &[u8; 20],
    ) -> Result<u128, ChainError> {
        let data = abi::encode_addresses_call(ALLOWANCE_SELECTOR, &[owner, spender]);
        let bytes = self.call_view(token, &data).await?;
        Ok(abi::raw_units(abi::word(&bytes, 0)?))
    }

    /// Soldes token / wrappé et allowance accordée au contrat wrappé
    #[instrument(skip(self, owner))]
    pub async fn wallet_balances(
        &self,
        token: &str,
        wrapped_token: &str,
        owner: &[u8; 20],
    ) -> Result<WalletBalances, ChainError> {
        let spender = abi::parse_address(wrapped_token)?;

        let (token_balance, wrapped, allowance) = tokio::try_join!(
            self.balance_of(token, owner),
            self.balance_of(wrapped_token, owner),
            self.allowance(token, owner, &spender),
        )?;

        Ok(WalletBalances {
            token: token_balance,
            wrapped,
            allowance,
        })
    }
}

/// Paramètres eth_call : appel en lecture sur le dernier bloc
fn view_call_params(contract: &str, data: &[u8]) -> Value {
    json!([{ "to": contract, "data": abi::encode_hex(data) }, "latest"])
}

/// Corps d'une requête JSON-RPC 2.0
fn request_body(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Paramètres eth_getLogs pour un filtre
fn log_filter_params(filter: &LogFilter) -> Value {
    json!([{
        "address": filter.address,
        "fromBlock": abi::to_quantity(filter.from_block),
        "toBlock": abi::to_quantity(filter.to_block),
        "topics": [filter.topic],
    }])
}

fn unwrap_response<T>(method: &str, response: RpcResponse<T>) -> Result<T, ChainError> {
    if let Some(err) = response.error {
        error!(method, code = err.code, message = %err.message, "JSON-RPC error");
        return Err(ChainError::LogQuery(format!(
            "{} failed ({}): {}",
            method, err.code, err.message
        )));
    }

    response
        .result
        .ok_or_else(|| ChainError::LogQuery(format!("{} returned no result", method)))
}

#[async_trait]
impl LogSource for JsonRpcClient {
    #[instrument(skip(self, filter), fields(from = filter.from_block, to = filter.to_block))]
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, ChainError> {
        let raw: Vec<RawLog> = self.call("eth_getLogs", log_filter_params(filter)).await?;
        raw.into_iter().map(RawLog::into_entry).collect()
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let raw: String = self.call("eth_blockNumber", json!([])).await?;
        abi::parse_quantity(&raw)
    }

    async fn block(&self, number: u64) -> Result<BlockInfo, ChainError> {
        let raw: RawBlock = self
            .call(
                "eth_getBlockByNumber",
                json!([abi::to_quantity(number), false]),
            )
            .await?;

        Ok(BlockInfo {
            number: abi::parse_quantity(&raw.number)?,
            timestamp: abi::parse_quantity(&raw.timestamp)? as i64,
        })
    }
}
