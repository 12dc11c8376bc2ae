use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Mining failed: exhausted nonce range without finding valid hash")]
    MiningExhausted,

    #[error("Mining cancelled before a valid nonce was found")]
    MiningCancelled,

    #[error("Mining timed out before a valid nonce was found")]
    MiningTimedOut,

    #[error("Invalid difficulty {0}: must be between 0 and 255")]
    InvalidDifficulty(u32),

    #[error("Difficulty mismatch: chain was created at {recorded}, configured {configured}")]
    DifficultyMismatch { recorded: u32, configured: u32 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Block not found: {0}")]
    NotFound(String),

    #[error("Tip conflict: expected parent {expected}, recorded tip is {actual}")]
    TipConflict { expected: String, actual: String },

    #[error("Chain is not initialized")]
    NotInitialized,

    #[error("Cycle detected at block {0}")]
    CycleDetected(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures reported by the storage collaborator, `NotFound` included.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
