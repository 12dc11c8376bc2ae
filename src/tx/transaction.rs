use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Reward carried by a coinbase output.
pub const SUBSIDY: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Vec<u8>,
    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: Vec<u8>,
    /// Output index spent, -1 for coinbase.
    pub vout: i64,
    pub signature: Vec<u8>,
    pub pub_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub pub_key_hash: Vec<u8>,
}

impl Transaction {
    /// Coinbase paying `SUBSIDY` to `to`. Empty `data` becomes "Reward to '<to>'".
    pub fn coinbase(to: &str, data: &str) -> Result<Transaction> {
        if to.is_empty() {
            return Err(Error::InvalidTransaction(
                "coinbase receiver must not be empty".to_string(),
            ));
        }
        let data = if data.is_empty() {
            format!("Reward to '{}'", to)
        } else {
            data.to_string()
        };

        let mut tx = Transaction {
            id: Vec::new(),
            vin: vec![TxInput {
                txid: Vec::new(),
                vout: -1,
                signature: Vec::new(),
                pub_key: data.into_bytes(),
            }],
            vout: vec![TxOutput {
                value: SUBSIDY,
                pub_key_hash: to.as_bytes().to_vec(),
            }],
        };
        tx.id = tx.compute_id()?;
        Ok(tx)
    }

    /// SHA256 of the transaction encoded with an empty id.
    pub fn compute_id(&self) -> Result<Vec<u8>> {
        let unsigned = Transaction {
            id: Vec::new(),
            ..self.clone()
        };
        let bytes = bincode::serialize(&unsigned)
            .map_err(|e| Error::Serialization(format!("Failed to serialize transaction: {}", e)))?;
        Ok(crate::sha256_digest(&bytes))
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].txid.is_empty() && self.vin[0].vout == -1
    }
}

/// Encode transactions as an opaque block payload.
pub fn encode_payload(txs: &[Transaction]) -> Result<Vec<u8>> {
    bincode::serialize(txs)
        .map_err(|e| Error::Serialization(format!("Failed to serialize payload: {}", e)))
}

/// Decode a block payload produced by `encode_payload`.
pub fn decode_payload(payload: &[u8]) -> Result<Vec<Transaction>> {
    bincode::deserialize(payload)
        .map_err(|e| Error::Serialization(format!("Failed to deserialize payload: {}", e)))
}

/// Default genesis factory: a single coinbase transaction.
pub fn genesis_payload(receiver: &str, data: &str) -> Result<Vec<u8>> {
    let coinbase = Transaction::coinbase(receiver, data)?;
    encode_payload(&[coinbase])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coinbase_shape() {
        let tx = Transaction::coinbase("alice", "").unwrap();
        assert!(tx.is_coinbase());
        assert_eq!(tx.vout[0].value, SUBSIDY);
        assert_eq!(tx.vout[0].pub_key_hash, b"alice");
        assert_eq!(tx.vin[0].pub_key, b"Reward to 'alice'");
        assert_eq!(tx.id, tx.compute_id().unwrap());
    }

    #[test]
    fn test_coinbase_id_depends_on_data() {
        let a = Transaction::coinbase("alice", "one").unwrap();
        let b = Transaction::coinbase("alice", "two").unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_coinbase_requires_receiver() {
        assert!(matches!(
            Transaction::coinbase("", "data"),
            Err(Error::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_payload_decoding() {
        let payload = genesis_payload("Genesis receiver", "Genesis data").unwrap();
        let txs = decode_payload(&payload).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].vin[0].pub_key, b"Genesis data");

        assert!(matches!(decode_payload(&[0xff]), Err(Error::Serialization(_))));
    }
}
