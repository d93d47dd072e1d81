use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;

use super::{txid_to_internal_bytes, AgentError, CoinAgent, REQUEST_TIMEOUT};
use crate::types::Utxo;

/// Esplora-compatible HTTP indexer (mempool.space, blockstream.info, electrs)
pub struct EsploraAgent {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TxStats {
    tx_count: u64,
}

#[derive(Debug, Deserialize)]
struct AddressInfo {
    chain_stats: TxStats,
    mempool_stats: TxStats,
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
}

impl EsploraAgent {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AgentError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json(&self, url: &str) -> Result<serde_json::Value, AgentError> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AgentError::QueryFailure(format!(
                "GET {} returned {}: {}",
                url, status, body
            )));
        }
        Ok(response.json()?)
    }
}

/// Total confirmed plus mempool transaction count from `/address/{addr}`
fn parse_tx_count(info: serde_json::Value) -> Result<u64, AgentError> {
    let info: AddressInfo = serde_json::from_value(info)
        .map_err(|e| AgentError::QueryFailure(format!("unexpected address info: {}", e)))?;
    Ok(info.chain_stats.tx_count + info.mempool_stats.tx_count)
}

/// UTXO list from `/address/{addr}/utxo`, zero-value entries dropped
fn parse_utxos(list: serde_json::Value) -> Result<Vec<Utxo>, AgentError> {
    let list: Vec<EsploraUtxo> = serde_json::from_value(list)
        .map_err(|e| AgentError::QueryFailure(format!("unexpected utxo list: {}", e)))?;

    list.into_iter()
        .filter(|u| u.value > 0)
        .map(|u| {
            Ok(Utxo {
                tx_hash: txid_to_internal_bytes(&u.txid)?,
                output_index: u.vout,
                value: u.value,
            })
        })
        .collect()
}

impl CoinAgent for EsploraAgent {
    fn get_unspent_outputs(&mut self, address: &str) -> Result<Vec<Utxo>, AgentError> {
        let info = self.get_json(&format!("{}/address/{}", self.base_url, address))?;
        if parse_tx_count(info)? == 0 {
            return Err(AgentError::NoTransactionHistory(address.to_string()));
        }

        let list = self.get_json(&format!("{}/address/{}/utxo", self.base_url, address))?;
        let utxos = parse_utxos(list)?;
        debug!("{} unspent outputs for {}", utxos.len(), address);
        Ok(utxos)
    }

    fn broadcast_transaction(&self, raw_tx_hex: &str) -> Result<String, AgentError> {
        debug!("Broadcasting transaction to: {}/tx", self.base_url);

        let response = self
            .client
            .post(format!("{}/tx", self.base_url))
            .body(raw_tx_hex.to_string())
            .send()?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AgentError::QueryFailure(format!(
                "Broadcast rejected: {}",
                error_text
            )));
        }

        Ok(response.text()?.trim().to_string())
    }
}
