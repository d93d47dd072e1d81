//! BIP44 key derivation and address generation
//!
//! Tree layout: `m / 44' / coin' / account' / chain / index`, hardened for the
//! first three levels, normal for chain and index.

use bitcoin::base58;
use bitcoin::bip32::{ChildNumber, Xpriv, Xpub};
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::PublicKey;

use crate::error::WalletError;
use crate::params::CoinParams;

/// A node of the derivation tree (private key plus chain code)
pub type ExtendedKey = Xpriv;

pub const BIP44_PURPOSE: u32 = 44;

/// Seeds outside these bounds are rejected (BIP32)
pub const MIN_SEED_LEN: usize = 16;
pub const MAX_SEED_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    /// Receiving addresses
    External,
    /// Change addresses
    Internal,
}

impl Chain {
    pub fn index(self) -> u32 {
        match self {
            Chain::External => 0,
            Chain::Internal => 1,
        }
    }
}

pub struct KeyDeriver {
    secp: Secp256k1<All>,
    params: &'static CoinParams,
}

impl KeyDeriver {
    pub fn new(params: &'static CoinParams) -> Self {
        Self {
            secp: Secp256k1::new(),
            params,
        }
    }

    pub fn params(&self) -> &'static CoinParams {
        self.params
    }

    pub fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }

    /// Master key of the tree rooted at `seed`
    pub fn master(&self, seed: &[u8]) -> Result<ExtendedKey, WalletError> {
        if seed.len() < MIN_SEED_LEN || seed.len() > MAX_SEED_LEN {
            return Err(WalletError::InvalidSeed(format!(
                "seed is {} bytes, expected {}..={}",
                seed.len(),
                MIN_SEED_LEN,
                MAX_SEED_LEN
            )));
        }
        Ok(Xpriv::new_master(self.params.network_kind(), seed)?)
    }

    /// Derive one level down; `index` must be below 2^31 in both modes
    pub fn child(
        &self,
        key: &ExtendedKey,
        index: u32,
        hardened: bool,
    ) -> Result<ExtendedKey, WalletError> {
        let child_number = if hardened {
            ChildNumber::from_hardened_idx(index)?
        } else {
            ChildNumber::from_normal_idx(index)?
        };
        Ok(key.derive_priv(&self.secp, &[child_number])?)
    }

    /// `m / 44' / coin' / account'`
    pub fn account_key(
        &self,
        seed: &[u8],
        coin_index: u32,
        account: u32,
    ) -> Result<ExtendedKey, WalletError> {
        let master = self.master(seed)?;
        let purpose = self.child(&master, BIP44_PURPOSE, true)?;
        let coin = self.child(&purpose, coin_index, true)?;
        self.child(&coin, account, true)
    }

    /// `account / chain / index`
    pub fn address_key(
        &self,
        account_key: &ExtendedKey,
        chain: Chain,
        index: u32,
    ) -> Result<ExtendedKey, WalletError> {
        let chain_key = self.child(account_key, chain.index(), false)?;
        self.child(&chain_key, index, false)
    }

    /// Compressed public key of `key`
    pub fn public_key(&self, key: &ExtendedKey) -> PublicKey {
        PublicKey::new(key.private_key.public_key(&self.secp))
    }

    /// Base58check P2PKH address of `public_key` under this coin's version byte
    pub fn address(&self, public_key: &PublicKey) -> String {
        let hash = public_key.pubkey_hash();
        let mut payload = Vec::with_capacity(21);
        payload.push(self.params.address_header);
        payload.extend_from_slice(&hash.to_byte_array());
        base58::encode_check(&payload)
    }

    pub fn key_address(&self, key: &ExtendedKey) -> String {
        self.address(&self.public_key(key))
    }

    /// Extended public key serialized with this coin's HD public key id
    pub fn export_public(&self, key: &ExtendedKey) -> String {
        let mut data = Xpub::from_priv(&self.secp, key).encode();
        data[..4].copy_from_slice(&self.params.hd_public_id);
        base58::encode_check(&data)
    }

    /// Extended private key serialized with this coin's HD private key id
    pub fn export_private(&self, key: &ExtendedKey) -> String {
        let mut data = key.encode();
        data[..4].copy_from_slice(&self.params.hd_private_id);
        base58::encode_check(&data)
    }

    /// Compressed-key WIF of a leaf key
    pub fn export_wif(&self, key: &ExtendedKey) -> String {
        let mut data = Vec::with_capacity(34);
        data.push(self.params.wif_header);
        data.extend_from_slice(&key.private_key.secret_bytes());
        data.push(0x01);
        base58::encode_check(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{BITCOIN_MAIN, BITCOIN_TEST, LITECOIN_MAIN};

    const SEED_HEX: &str = "fded5e8970380eef15f742348d28511111366ae6a55188402b16c69922006fe6";

    fn seed() -> Vec<u8> {
        hex::decode(SEED_HEX).unwrap()
    }

    #[test]
    fn test_bip32_vector_one_export() {
        let deriver = KeyDeriver::new(&BITCOIN_MAIN);
        let master = deriver
            .master(&hex::decode("000102030405060708090a0b0c0d0e0f").unwrap())
            .unwrap();

        assert_eq!(
            deriver.export_public(&master),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );
        assert_eq!(
            deriver.export_private(&master),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
    }

    #[test]
    fn test_testnet_export_uses_tpub_id() {
        let deriver = KeyDeriver::new(&BITCOIN_TEST);
        let master = deriver
            .master(&hex::decode("000102030405060708090a0b0c0d0e0f").unwrap())
            .unwrap();
        assert_eq!(
            deriver.export_public(&master),
            "tpubD6NzVbkrYhZ4XgiXtGrdW5XDAPFCL9h7we1vwNCpn8tGbBcgfVYjXyhWo4E1xkh56hjod1RhGjxbaTLV3X4FyWuejifB9jusQ46QzG87VKp"
        );
    }

    #[test]
    fn test_testnet_external_addresses() {
        let deriver = KeyDeriver::new(&BITCOIN_TEST);
        let account = deriver.account_key(&seed(), 0, 0).unwrap();

        let expected = [
            "mrPpdSCzGT25wD4Jmnv4umr8JcdRG24bQK",
            "mtTBNyr5qFsuuHdLAGMzAa7gxdrxtGE1gr",
            "msKPNgsAzmruLkBzsQUHCkfSKeDFC7WEz1",
            "n1pFJdpD5DEtuEvYrjbfFE8SqdxjszwnQh",
        ];
        for (index, address) in expected.iter().enumerate() {
            let key = deriver
                .address_key(&account, Chain::External, index as u32)
                .unwrap();
            assert_eq!(&deriver.key_address(&key), address);
        }
    }

    #[test]
    fn test_internal_chain_differs_from_external() {
        let deriver = KeyDeriver::new(&BITCOIN_TEST);
        let account = deriver.account_key(&seed(), 0, 0).unwrap();

        let internal = deriver.address_key(&account, Chain::Internal, 0).unwrap();
        assert_eq!(
            deriver.key_address(&internal),
            "mhwSoJpLp2rdCpJ7ibGE2nvA2uuYf1HCpV"
        );
        assert_eq!(deriver.key_address(&account), "mmrbKsdiucEDRhf5Fw6Ca89yuZPSAg5U1R");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let deriver = KeyDeriver::new(&LITECOIN_MAIN);
        let a = deriver.account_key(&seed(), 2, 0).unwrap();
        let b = deriver.account_key(&seed(), 2, 0).unwrap();
        assert_eq!(a, b);

        let key_a = deriver.address_key(&a, Chain::External, 1).unwrap();
        let key_b = deriver.address_key(&b, Chain::External, 1).unwrap();
        assert_eq!(key_a, key_b);
        assert_eq!(deriver.key_address(&key_a), "LhukqjCnqfSW5Kv3KBBRM3FvGwyr1sJ2jG");
    }

    #[test]
    fn test_out_of_range_index_is_derivation_error() {
        let deriver = KeyDeriver::new(&BITCOIN_TEST);
        let account = deriver.account_key(&seed(), 0, 0).unwrap();
        let result = deriver.child(&account, 1 << 31, false);
        assert!(matches!(result, Err(WalletError::Derivation(_))));
    }

    #[test]
    fn test_seed_length_bounds() {
        let deriver = KeyDeriver::new(&BITCOIN_TEST);
        assert!(matches!(
            deriver.master(&[0u8; 15]),
            Err(WalletError::InvalidSeed(_))
        ));
        assert!(matches!(
            deriver.master(&[0u8; 65]),
            Err(WalletError::InvalidSeed(_))
        ));
        assert!(deriver.master(&[1u8; 16]).is_ok());
    }

    #[test]
    fn test_wif_prefix() {
        let deriver = KeyDeriver::new(&BITCOIN_MAIN);
        let account = deriver.account_key(&seed(), 0, 0).unwrap();
        let wif = deriver.export_wif(&account);
        // compressed mainnet WIF starts with K or L
        assert!(wif.starts_with('K') || wif.starts_with('L'));
        assert_eq!(wif.len(), 52);
    }
}
