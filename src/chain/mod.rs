pub mod block;
pub mod blockchain;
pub mod cancel;
pub mod consensus;
pub mod observer;

pub use block::Block;
pub use blockchain::{Chain, ChainIter};
pub use cancel::CancelToken;
pub use consensus::ProofOfWork;
pub use observer::{ChainObserver, NoOpObserver, TracingObserver};
