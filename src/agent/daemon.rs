use log::{debug, info};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{coins_to_minor_units, txid_to_internal_bytes, AgentError, CoinAgent, REQUEST_TIMEOUT};
use crate::types::Utxo;

const IMPORT_LABEL: &str = "coin-wallet watched";

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceivedAddress {
    pub address: String,
    #[serde(default)]
    pub txids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RpcUnspent {
    txid: String,
    vout: u32,
    #[serde(default)]
    address: String,
    amount: f64,
}

/// bitcoind/litecoind wallet RPC, watching derived addresses as watch-only imports
pub struct DaemonAgent {
    client: Client,
    url: String,
    user: String,
    password: String,
    /// `listreceivedbyaddress` snapshot, refreshed per discovery pass and after imports
    watched: Option<Vec<ReceivedAddress>>,
}

impl DaemonAgent {
    pub fn new(
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, AgentError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            user: user.into(),
            password: password.into(),
            watched: None,
        })
    }

    fn call(&self, method: &str, params: Value) -> Result<Value, AgentError> {
        let body = json!({
            "jsonrpc": "1.0",
            "id": "coin-wallet",
            "method": method,
            "params": params,
        });

        // the daemon reports RPC errors with a non-2xx status and a JSON body
        let response: RpcResponse = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()?
            .json()?;

        parse_response(method, response)
    }

    fn refresh_watched(&mut self) -> Result<(), AgentError> {
        let result = self.call("listreceivedbyaddress", json!([0, true, true]))?;
        let watched = parse_received(result)?;
        debug!("Refreshed watched addresses: {}", watched.len());
        self.watched = Some(watched);
        Ok(())
    }

    fn import_address(&self, address: &str) -> Result<(), AgentError> {
        info!("Importing watch-only address {}", address);
        self.call("importaddress", json!([address, IMPORT_LABEL, false]))?;
        Ok(())
    }

    fn is_watched(&self, address: &str) -> bool {
        self.watched
            .as_deref()
            .map(|list| list.iter().any(|r| r.address == address))
            .unwrap_or(false)
    }

    fn is_used(&self, address: &str) -> bool {
        self.watched
            .as_deref()
            .map(|list| {
                list.iter()
                    .any(|r| r.address == address && !r.txids.is_empty())
            })
            .unwrap_or(false)
    }
}

fn parse_response(method: &str, response: RpcResponse) -> Result<Value, AgentError> {
    if let Some(error) = response.error {
        return Err(AgentError::QueryFailure(format!(
            "{} failed: {} (code: {})",
            method, error.message, error.code
        )));
    }
    Ok(response.result)
}

fn parse_received(result: Value) -> Result<Vec<ReceivedAddress>, AgentError> {
    serde_json::from_value(result)
        .map_err(|e| AgentError::QueryFailure(format!("unexpected listreceivedbyaddress result: {}", e)))
}

/// `listunspent` result filtered to `address`, zero-value entries dropped
fn parse_unspent(result: Value, address: &str) -> Result<Vec<Utxo>, AgentError> {
    let list: Vec<RpcUnspent> = serde_json::from_value(result)
        .map_err(|e| AgentError::QueryFailure(format!("unexpected listunspent result: {}", e)))?;

    let mut utxos = Vec::new();
    for entry in list.into_iter().filter(|u| u.address == address) {
        let value = coins_to_minor_units(entry.amount)?;
        if value == 0 {
            continue;
        }
        utxos.push(Utxo {
            tx_hash: txid_to_internal_bytes(&entry.txid)?,
            output_index: entry.vout,
            value,
        });
    }
    Ok(utxos)
}

impl CoinAgent for DaemonAgent {
    fn begin_discovery(&mut self) -> Result<(), AgentError> {
        self.refresh_watched()
    }

    fn get_unspent_outputs(&mut self, address: &str) -> Result<Vec<Utxo>, AgentError> {
        if self.watched.is_none() {
            self.refresh_watched()?;
        }

        if !self.is_watched(address) {
            self.import_address(address)?;
            self.refresh_watched()?;
        }

        if !self.is_used(address) {
            return Err(AgentError::NoTransactionHistory(address.to_string()));
        }

        let result = self.call("listunspent", json!([0, 9_999_999, [address]]))?;
        parse_unspent(result, address)
    }

    fn broadcast_transaction(&self, raw_tx_hex: &str) -> Result<String, AgentError> {
        let result = self.call("sendrawtransaction", json!([raw_tx_hex]))?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::QueryFailure(format!("unexpected sendrawtransaction result: {}", result)))
    }
}
