use crate::chain::block::Block;
use crate::chain::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::Digest;
use num_bigint::BigUint;

const MAX_NONCE: u64 = u64::MAX;

/// Number of attempts between cancellation checks.
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Highest accepted difficulty; 256 would make the target 1 and no digest could pass.
pub const MAX_DIFFICULTY: u32 = 255;

/// Nonce search for `SHA256(payload ‖ link ‖ nonce) < 2^(256 - difficulty)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: u32,
    target: BigUint,
    max_nonce: u64,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Result<Self> {
        if difficulty > MAX_DIFFICULTY {
            return Err(Error::InvalidDifficulty(difficulty));
        }
        let target = BigUint::from(1u8) << (256 - difficulty as usize);
        Ok(ProofOfWork {
            difficulty,
            target,
            max_nonce: MAX_NONCE,
        })
    }

    /// Bound the search to `0..=max_nonce`.
    pub fn with_max_nonce(mut self, max_nonce: u64) -> Self {
        self.max_nonce = max_nonce;
        self
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn target(&self) -> &BigUint {
        &self.target
    }

    pub fn prepare_data(payload: &[u8], link: &[u8], nonce: u64) -> Vec<u8> {
        // Format: payload + link + nonce (u64 big-endian)
        let mut data = Vec::with_capacity(payload.len() + link.len() + 8);
        data.extend_from_slice(payload);
        data.extend_from_slice(link);
        data.extend_from_slice(&nonce.to_be_bytes());
        data
    }

    pub fn hash(payload: &[u8], link: &[u8], nonce: u64) -> Digest {
        crate::sha256_digest(&Self::prepare_data(payload, link, nonce))
    }

    pub fn meets_target(&self, digest: &[u8]) -> bool {
        BigUint::from_bytes_be(digest) < self.target
    }

    /// Search ascending from nonce 0. Returns the first `(nonce, digest)` under target.
    pub fn run(&self, payload: &[u8], link: &[u8], cancel: &CancelToken) -> Result<(u64, Digest)> {
        let mut nonce = 0u64;
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 {
                cancel.check()?;
            }
            let hash = Self::hash(payload, link, nonce);
            if self.meets_target(&hash) {
                return Ok((nonce, hash));
            }
            if nonce >= self.max_nonce {
                return Err(Error::MiningExhausted);
            }
            nonce += 1;
        }
    }

    /// Re-check sealing and difficulty for an already built block.
    pub fn validate(&self, block: &Block) -> bool {
        let hash = Self::hash(block.payload(), block.link(), block.nonce());
        hash == block.digest() && self.meets_target(&hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_target_from_difficulty() {
        let pow = ProofOfWork::new(8).unwrap();
        assert_eq!(pow.target(), &(BigUint::from(1u8) << 248usize));
        assert_eq!(pow.difficulty(), 8);
    }

    #[test]
    fn test_difficulty_out_of_range() {
        assert!(matches!(ProofOfWork::new(256), Err(Error::InvalidDifficulty(256))));
        assert!(ProofOfWork::new(255).is_ok());
    }

    #[test]
    fn test_run_finds_digest_under_target() {
        let pow = ProofOfWork::new(8).unwrap();
        let (nonce, digest) = pow.run(b"payload", b"link", &CancelToken::new()).unwrap();
        assert_eq!(digest, ProofOfWork::hash(b"payload", b"link", nonce));
        assert!(pow.meets_target(&digest));
        // First byte must be zero for difficulty 8
        assert_eq!(digest[0], 0);
    }

    #[test]
    fn test_run_is_deterministic() {
        let pow = ProofOfWork::new(8).unwrap();
        let first = pow.run(b"same", b"", &CancelToken::new()).unwrap();
        let second = pow.run(b"same", b"", &CancelToken::new()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_nonce_is_smallest_solution() {
        let pow = ProofOfWork::new(6).unwrap();
        let (nonce, _) = pow.run(b"abc", b"", &CancelToken::new()).unwrap();
        for earlier in 0..nonce {
            assert!(!pow.meets_target(&ProofOfWork::hash(b"abc", b"", earlier)));
        }
    }

    #[test]
    fn test_exhausted_nonce_range() {
        let pow = ProofOfWork::new(MAX_DIFFICULTY).unwrap().with_max_nonce(16);
        assert!(matches!(
            pow.run(b"x", b"", &CancelToken::new()),
            Err(Error::MiningExhausted)
        ));
    }

    #[test]
    fn test_cancelled_search_stops() {
        let pow = ProofOfWork::new(MAX_DIFFICULTY).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(pow.run(b"x", b"", &cancel), Err(Error::MiningCancelled)));
    }

    #[test]
    fn test_search_times_out() {
        let pow = ProofOfWork::new(MAX_DIFFICULTY).unwrap();
        let cancel = CancelToken::with_timeout(Duration::from_millis(20));
        assert!(matches!(pow.run(b"x", b"", &cancel), Err(Error::MiningTimedOut)));
    }

    #[test]
    fn test_zero_difficulty_accepts_first_nonce() {
        let pow = ProofOfWork::new(0).unwrap();
        let (nonce, _) = pow.run(b"x", b"", &CancelToken::new()).unwrap();
        assert_eq!(nonce, 0);
    }
}
