pub mod chain;
pub mod tx;
pub mod storage;
pub mod error;
pub mod logger;
pub mod config;

use sha2::{Sha256, Digest as _};

/// Block digest bytes. The empty digest is the genesis link sentinel.
pub type Digest = Vec<u8>;

/// Length of a SHA256 block digest.
pub const DIGEST_LEN: usize = 32;

/// Calculate SHA256 digest
pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Hex form of a digest for logs and error messages; `<genesis>` for the empty link.
pub fn digest_label(digest: &[u8]) -> String {
    if digest.is_empty() {
        "<genesis>".to_string()
    } else {
        hex::encode(digest)
    }
}
