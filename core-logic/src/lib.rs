//! # Core Logic - Shared Substrate for the Transaction Sequencer
//!
//! This crate provides the chain-agnostic substrate the sequencing service
//! runs on: durable key-value storage, idempotent wake-up scheduling,
//! configuration, and typed errors.
//!
//! ## Modules
//!
//! - [`config`] - Configuration structures for the sequencer service
//! - [`error`] - Typed error handling with thiserror
//! - [`scheduler`] - Idempotent "wake me at time T" timers
//! - [`store`] - Durable key-value storage (SQLite) plus an in-memory store
//! - `utils` - Logger setup

pub mod config;
pub mod error;
pub mod scheduler;
pub mod store;
pub(crate) mod utils;

pub use config::{SequencerConfig, WalletSource};
pub use error::{ConfigError, StoreError};
pub use scheduler::WakeScheduler;
pub use store::{ExclusiveGuard, MemoryStore, SqliteStore, StateStore};
pub use utils::setup_logger;
