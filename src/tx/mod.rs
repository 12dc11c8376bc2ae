pub mod transaction;

pub use transaction::{
    decode_payload, encode_payload, genesis_payload, Transaction, TxInput, TxOutput, SUBSIDY,
};
