//! Spend transaction assembly
//!
//! - Input selection and the fee/size fixed point
//! - P2PKH signing
//! - Null-data (OP_RETURN) outputs

mod builder;
mod null_data;
mod signer;

pub use builder::{
    BuiltTransaction, SpendableUtxo, TransactionBuilder, CHANGE_OUTPUT_COST_BYTES,
};
pub use null_data::{extract_null_data, null_data_output, MAX_NULL_DATA_LEN};
pub use signer::sign_transaction;
