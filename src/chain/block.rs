use crate::chain::cancel::CancelToken;
use crate::chain::consensus::ProofOfWork;
use crate::error::{Error, Result};
use crate::Digest;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on an encoded block, so a corrupted length prefix cannot drive allocation.
const MAX_BLOCK_BYTES: u64 = 64 * 1024 * 1024;

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_BLOCK_BYTES)
        .reject_trailing_bytes()
}

/// A sealed block. Only `build` and `deserialize` produce one, so `digest`
/// always comes from the proof-of-work search or from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    payload: Vec<u8>,
    digest: Digest,
    link: Digest,
    nonce: u64,
}

impl Block {
    /// Seal `payload` on top of `link`. Blocks until a nonce is found or the
    /// search fails; no block value exists on the failure path.
    pub fn build(
        payload: Vec<u8>,
        link: Digest,
        pow: &ProofOfWork,
        cancel: &CancelToken,
    ) -> Result<Block> {
        let (nonce, digest) = pow.run(&payload, &link, cancel)?;
        Ok(Block {
            payload,
            digest,
            link,
            nonce,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        codec()
            .serialize(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize block: {}", e)))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        codec()
            .deserialize(bytes)
            .map_err(|e| Error::Serialization(format!("Failed to deserialize block: {}", e)))
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    pub fn link(&self) -> &[u8] {
        &self.link
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.link.is_empty()
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(&self.digest)
    }

    pub fn link_hex(&self) -> String {
        hex::encode(&self.link)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\t Data:\t{}", String::from_utf8_lossy(&self.payload))?;
        writeln!(f, "\t Hash:\t{}", self.digest_hex())?;
        writeln!(f, "\t Link:\t{}", self.link_hex())?;
        write!(f, "\t Nonce:\t{}", self.nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seal(payload: &[u8], link: &[u8]) -> Block {
        let pow = ProofOfWork::new(8).unwrap();
        Block::build(payload.to_vec(), link.to_vec(), &pow, &CancelToken::new()).unwrap()
    }

    #[test]
    fn test_build_seals_block() {
        let pow = ProofOfWork::new(8).unwrap();
        let block = seal(b"hello", b"");
        assert!(block.is_genesis());
        assert!(pow.validate(&block));
        assert_eq!(
            block.digest(),
            ProofOfWork::hash(b"hello", b"", block.nonce()).as_slice()
        );
    }

    #[test]
    fn test_serialize_round_trip() {
        let genesis = seal(b"genesis", b"");
        let block = seal(b"second", genesis.digest());
        let bytes = block.serialize().unwrap();
        let decoded = Block::deserialize(&bytes).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.link(), genesis.digest());
    }

    #[test]
    fn test_deserialize_truncated_input() {
        let bytes = seal(b"payload", b"").serialize().unwrap();
        for len in [0, 1, bytes.len() / 2, bytes.len() - 1] {
            assert!(matches!(
                Block::deserialize(&bytes[..len]),
                Err(Error::Serialization(_))
            ));
        }
    }

    #[test]
    fn test_deserialize_trailing_garbage() {
        let mut bytes = seal(b"payload", b"").serialize().unwrap();
        bytes.push(0xff);
        assert!(matches!(Block::deserialize(&bytes), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_deserialize_huge_length_prefix() {
        let bytes = vec![0xfc, 0xff, 0xff, 0xff, 0xff];
        assert!(matches!(Block::deserialize(&bytes), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_display_dump() {
        let block = seal(b"readable", b"");
        let dump = block.to_string();
        assert!(dump.contains("readable"));
        assert!(dump.contains(&block.digest_hex()));
        assert!(dump.contains(&format!("Nonce:\t{}", block.nonce())));
    }
}
