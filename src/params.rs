//! Coin and network parameter tables
//!
//! Version bytes for base58check addresses and HD key ids per coin/network,
//! the BIP44 coin index, and the default fee per kilobyte.

use std::fmt;
use std::str::FromStr;

use bitcoin::NetworkKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoinType {
    Btc,
    Ltc,
}

impl CoinType {
    /// BIP44 registered coin index (hardened at derivation time)
    pub fn bip44_index(self) -> u32 {
        match self {
            CoinType::Btc => 0,
            CoinType::Ltc => 2,
        }
    }

    /// Default fee in minor units per 1000 bytes of serialized transaction
    pub fn default_fee_per_kb(self) -> u64 {
        match self {
            CoinType::Btc => 20_000,
            CoinType::Ltc => 100_000,
        }
    }

    pub fn params(self, testnet: bool) -> &'static CoinParams {
        match (self, testnet) {
            (CoinType::Btc, false) => &BITCOIN_MAIN,
            (CoinType::Btc, true) => &BITCOIN_TEST,
            (CoinType::Ltc, false) => &LITECOIN_MAIN,
            (CoinType::Ltc, true) => &LITECOIN_TEST,
        }
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinType::Btc => write!(f, "BTC"),
            CoinType::Ltc => write!(f, "LTC"),
        }
    }
}

impl FromStr for CoinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "btc" | "bitcoin" => Ok(CoinType::Btc),
            "ltc" | "litecoin" => Ok(CoinType::Ltc),
            other => Err(format!("unknown coin type '{}'", other)),
        }
    }
}

/// Network parameter set for one coin on one network
#[derive(Debug, PartialEq, Eq)]
pub struct CoinParams {
    pub name: &'static str,
    pub testnet: bool,
    /// WIF private key prefix
    pub wif_header: u8,
    /// P2PKH address version byte
    pub address_header: u8,
    /// Accepted P2SH version bytes; the first one is canonical
    pub p2sh_headers: &'static [u8],
    pub hd_private_id: [u8; 4],
    pub hd_public_id: [u8; 4],
}

impl CoinParams {
    pub fn network_kind(&self) -> NetworkKind {
        if self.testnet {
            NetworkKind::Test
        } else {
            NetworkKind::Main
        }
    }

    pub fn is_p2sh_header(&self, version: u8) -> bool {
        self.p2sh_headers.contains(&version)
    }
}

pub static BITCOIN_MAIN: CoinParams = CoinParams {
    name: "bitcoin",
    testnet: false,
    wif_header: 128,
    address_header: 0,
    p2sh_headers: &[5],
    hd_private_id: [0x04, 0x88, 0xad, 0xe4],
    hd_public_id: [0x04, 0x88, 0xb2, 0x1e],
};

pub static BITCOIN_TEST: CoinParams = CoinParams {
    name: "bitcoin-testnet",
    testnet: true,
    wif_header: 239,
    address_header: 111,
    p2sh_headers: &[196],
    hd_private_id: [0x04, 0x35, 0x83, 0x94],
    hd_public_id: [0x04, 0x35, 0x87, 0xcf],
};

pub static LITECOIN_MAIN: CoinParams = CoinParams {
    name: "litecoin",
    testnet: false,
    wif_header: 176,
    address_header: 48,
    p2sh_headers: &[50, 5],
    hd_private_id: [0x04, 0x88, 0xad, 0xe4],
    hd_public_id: [0x04, 0x88, 0xb2, 0x1e],
};

pub static LITECOIN_TEST: CoinParams = CoinParams {
    name: "litecoin-testnet",
    testnet: true,
    wif_header: 239,
    address_header: 111,
    p2sh_headers: &[58, 196],
    hd_private_id: [0x04, 0x35, 0x83, 0x94],
    hd_public_id: [0x04, 0x35, 0x87, 0xcf],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_type_parsing() {
        assert_eq!("BTC".parse::<CoinType>().unwrap(), CoinType::Btc);
        assert_eq!("litecoin".parse::<CoinType>().unwrap(), CoinType::Ltc);
        assert!("doge".parse::<CoinType>().is_err());
        assert_eq!(CoinType::Ltc.to_string(), "LTC");
    }

    #[test]
    fn test_params_lookup() {
        assert_eq!(CoinType::Btc.params(true).address_header, 111);
        assert_eq!(CoinType::Ltc.params(false).address_header, 48);
        assert_eq!(CoinType::Ltc.bip44_index(), 2);
        assert_eq!(CoinType::Btc.default_fee_per_kb(), 20_000);
        assert!(LITECOIN_MAIN.is_p2sh_header(50));
        assert!(!BITCOIN_MAIN.is_p2sh_header(50));
        assert_eq!(BITCOIN_TEST.network_kind(), NetworkKind::Test);
    }
}
