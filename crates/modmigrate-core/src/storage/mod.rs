//! State storage.
//!
//! A sled-backed key/value store for module state. The recorded version map
//! lives beside the state so an upgrade commits both in one transaction.

mod config;
mod engine;
mod transaction;

pub use config::StoreConfig;
pub use engine::StateStore;
pub use transaction::{StateTransaction, TransactionOp};
