//! Binary encoding of a stored UTXO list
//!
//! Each entry is `varint(len(tx_hash)) || tx_hash || varint(output_index) ||
//! varint(value)`, entries concatenated with no header.

use super::LedgerError;
use crate::types::Utxo;

/// Longest varint: eight 7-bit groups plus one full byte
pub const MAX_VARINT_LEN: usize = 9;

/// Append `value` as a little-endian base-128 varint
pub fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    for _ in 0..MAX_VARINT_LEN - 1 {
        if value < 0x80 {
            buf.push(value as u8);
            return;
        }
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Read a varint from the front of `data`, returning the value and bytes consumed
pub fn get_varint(data: &[u8]) -> Result<(u64, usize), LedgerError> {
    let mut value = 0u64;
    for (i, &byte) in data.iter().take(MAX_VARINT_LEN).enumerate() {
        let last = i == MAX_VARINT_LEN - 1 || byte & 0x80 == 0;
        // a zero final group after a continuation byte is an overlong encoding
        if last && i > 0 && byte == 0 {
            return Err(LedgerError::Corrupted("overlong varint".to_string()));
        }
        if i == MAX_VARINT_LEN - 1 {
            value |= (byte as u64) << 56;
            return Ok((value, MAX_VARINT_LEN));
        }
        value |= ((byte & 0x7f) as u64) << (7 * i);
        if last {
            return Ok((value, i + 1));
        }
    }
    Err(LedgerError::Corrupted("truncated varint".to_string()))
}

pub fn encode_utxos(utxos: &[Utxo]) -> Vec<u8> {
    let mut buf = Vec::new();
    for utxo in utxos {
        put_varint(&mut buf, utxo.tx_hash.len() as u64);
        buf.extend_from_slice(&utxo.tx_hash);
        put_varint(&mut buf, utxo.output_index as u64);
        put_varint(&mut buf, utxo.value);
    }
    buf
}

pub fn decode_utxos(data: &[u8]) -> Result<Vec<Utxo>, LedgerError> {
    let mut utxos = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let (hash_len, n) = get_varint(&data[pos..])?;
        pos += n;

        let remaining = (data.len() - pos) as u64;
        if hash_len > remaining {
            return Err(LedgerError::Corrupted(format!(
                "tx hash length {} exceeds remaining {} bytes",
                hash_len, remaining
            )));
        }
        let end = pos + hash_len as usize;
        let tx_hash = data[pos..end].to_vec();
        pos = end;

        let (index, n) = get_varint(&data[pos..])?;
        pos += n;
        let output_index = u32::try_from(index)
            .map_err(|_| LedgerError::Corrupted(format!("output index {} out of range", index)))?;

        let (value, n) = get_varint(&data[pos..])?;
        pos += n;

        utxos.push(Utxo {
            tx_hash,
            output_index,
            value,
        });
    }

    Ok(utxos)
}
