//! Gap-limited address discovery
//!
//! Walks the external chain and then the internal chain from index 0, asking
//! the agent for each address's unspent outputs, until `gap_limit`
//! consecutive addresses have no transaction history. Every chain is walked
//! at least up to one past the stored watermark, where the account hands
//! out new addresses on both chains.
//!
//! The watermark is raised as soon as a used index above it is found, before
//! that address's record is written, so every stored record lies within
//! `0..=watermark` even when a scan aborts.

use log::{debug, info};

use crate::agent::{AgentError, CoinAgent};
use crate::error::WalletError;
use crate::keys::{Chain, ExtendedKey, KeyDeriver};
use crate::ledger::UtxoLedger;

/// Consecutive unused addresses scanned before a chain is considered exhausted
pub const ADDRESS_GAP_LIMIT: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainScan {
    pub chain: Chain,
    /// Addresses queried on this chain
    pub visited: u32,
    pub last_used: Option<u32>,
    /// UTXOs written to the ledger from this chain
    pub utxo_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub external: ChainScan,
    pub internal: ChainScan,
    pub watermark: u32,
}

pub struct AddressScanner<'a> {
    deriver: &'a KeyDeriver,
    account_key: &'a ExtendedKey,
    gap_limit: u32,
}

impl<'a> AddressScanner<'a> {
    pub fn new(deriver: &'a KeyDeriver, account_key: &'a ExtendedKey) -> Self {
        Self {
            deriver,
            account_key,
            gap_limit: ADDRESS_GAP_LIMIT,
        }
    }

    /// A limit of zero is raised to one
    pub fn with_gap_limit(mut self, gap_limit: u32) -> Self {
        self.gap_limit = gap_limit.max(1);
        self
    }

    pub fn gap_limit(&self) -> u32 {
        self.gap_limit
    }

    /// Scan both chains, write the ledger and advance the watermark
    pub fn scan(
        &self,
        agent: &mut dyn CoinAgent,
        ledger: &dyn UtxoLedger,
    ) -> Result<DiscoveryReport, WalletError> {
        agent.begin_discovery()?;

        let mut watermark = ledger.last_index()?;
        let floor = watermark.saturating_add(1);

        let external = self.scan_chain(Chain::External, floor, &mut watermark, agent, ledger)?;
        let internal = self.scan_chain(Chain::Internal, floor, &mut watermark, agent, ledger)?;

        info!(
            "Discovery finished: external last used {:?}, internal last used {:?}, watermark {}",
            external.last_used, internal.last_used, watermark
        );

        Ok(DiscoveryReport {
            external,
            internal,
            watermark,
        })
    }

    /// Walk one chain; indices up to `floor` are always visited
    fn scan_chain(
        &self,
        chain: Chain,
        floor: u32,
        watermark: &mut u32,
        agent: &mut dyn CoinAgent,
        ledger: &dyn UtxoLedger,
    ) -> Result<ChainScan, WalletError> {
        let mut scan = ChainScan {
            chain,
            visited: 0,
            last_used: None,
            utxo_count: 0,
        };
        let mut gap = 0;
        let mut index = 0;

        while gap < self.gap_limit || index <= floor {
            let key = self.deriver.address_key(self.account_key, chain, index)?;
            let address = self.deriver.key_address(&key);
            scan.visited += 1;

            match agent.get_unspent_outputs(&address) {
                Err(AgentError::NoTransactionHistory(_)) => {
                    debug!("{:?}/{} {}: no history", chain, index, address);
                    gap += 1;
                }
                Ok(utxos) => {
                    debug!(
                        "{:?}/{} {}: {} unspent outputs",
                        chain,
                        index,
                        address,
                        utxos.len()
                    );
                    gap = 0;
                    scan.last_used = Some(index);
                    scan.utxo_count += utxos.len();
                    if index > *watermark {
                        ledger.set_last_index(index)?;
                        *watermark = index;
                    }
                    ledger.set_utxos(&address, &utxos)?;
                }
                Err(e) => return Err(e.into()),
            }

            index += 1;
        }

        Ok(scan)
    }
}
