//! Nonce-sequenced transaction submission for EVM chains.
//!
//! Callers hand transactions to the [`Sequencer`]; each wallet's
//! submissions are assigned dense nonces, submitted strictly in order
//! under a bounded in-flight window, and tracked through confirmation.
//! Failed submissions either retry in place (transient) or consume their
//! nonce with a zero-value self-transfer (non-retriable) so later nonces
//! are never stranded behind a dead one.
//!
//! Module map:
//! - `types`: watermarks, requests, records, derived statuses
//! - `chain`: the chain client seam and error classification
//! - `actor` / `registry`: per-wallet state machines
//! - `pool`: rotation and balance-based admission
//! - `sequencer`: the wired-up facade
//! - `abi` / `keys` / `rpc`: calldata encoding, signing keys, ethers
//!   transport

pub mod abi;
pub mod actor;
pub mod chain;
pub mod error;
pub mod keys;
pub mod pool;
pub mod registry;
pub mod rpc;
pub mod sequencer;
pub mod types;

pub use actor::{ActorConfig, WalletActor};
pub use chain::{ChainClient, ChainError, ChainErrorKind, TxParams};
pub use error::{KeyError, SequencerError, ValidationError};
pub use keys::KeyStore;
pub use pool::{PoolConfig, WalletPool};
pub use registry::WalletRegistry;
pub use rpc::EthersChainClient;
pub use sequencer::Sequencer;
pub use types::{
    NonceState, SubmitRequest, SubmitResponse, TransactionRecord, TransactionView, TxStatus,
    WakeKey, WalletStatus,
};
