//! Buffered transactions over the state store.

use std::collections::{BTreeMap, HashMap};

use super::engine::VERSION_MAP_KEY;
use super::StateStore;
use crate::error::Error;
use crate::version::VersionMap;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Transactional, Tree};

/// A pending operation in a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOp {
    /// Write a value.
    Put {
        /// State key.
        key: Vec<u8>,
        /// New value.
        value: Vec<u8>,
    },
    /// Remove a value.
    Delete {
        /// State key.
        key: Vec<u8>,
    },
}

/// A transaction over module state.
///
/// Writes are buffered and visible to reads made through the transaction.
/// Nothing reaches the store until [`commit`](Self::commit); dropping the
/// transaction discards every buffered write.
///
/// The transaction holds its own handles to the store's trees, so it does
/// not borrow the [`StateStore`] and migration functions can name it without
/// a lifetime.
pub struct StateTransaction {
    state_tree: Tree,
    meta_tree: Tree,
    ops: Vec<TransactionOp>,
    /// Uncommitted writes (key -> value, None for deletes).
    write_cache: HashMap<Vec<u8>, Option<Vec<u8>>>,
    /// Version map to record on commit.
    staged_versions: Option<VersionMap>,
}

impl StateTransaction {
    pub(crate) fn new(store: &StateStore) -> Self {
        Self {
            state_tree: store.state_tree().clone(),
            meta_tree: store.meta_tree().clone(),
            ops: Vec::new(),
            write_cache: HashMap::new(),
            staged_versions: None,
        }
    }

    /// Read a value, seeing this transaction's uncommitted writes.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        if let Some(cached) = self.write_cache.get(key) {
            return Ok(cached.clone());
        }
        Ok(self.state_tree.get(key)?.map(|v| v.to_vec()))
    }

    /// Check if a key exists.
    pub fn exists(&self, key: &[u8]) -> Result<bool, Error> {
        Ok(self.get(key)?.is_some())
    }

    /// Queue a write.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> &mut Self {
        self.write_cache.insert(key.to_vec(), Some(value.to_vec()));
        self.ops.push(TransactionOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
        self
    }

    /// Queue a delete.
    pub fn delete(&mut self, key: &[u8]) -> &mut Self {
        self.write_cache.insert(key.to_vec(), None);
        self.ops.push(TransactionOp::Delete { key: key.to_vec() });
        self
    }

    /// Entries under `prefix` as this transaction sees them, in key order.
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        let mut merged = BTreeMap::new();
        for entry in self.state_tree.scan_prefix(prefix) {
            let (key, value) = entry?;
            merged.insert(key.to_vec(), value.to_vec());
        }

        for (key, cached) in &self.write_cache {
            if !key.starts_with(prefix) {
                continue;
            }
            match cached {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    /// Record `versions` as the version map when this transaction commits.
    pub fn stage_version_map(&mut self, versions: &VersionMap) -> &mut Self {
        self.staged_versions = Some(versions.clone());
        self
    }

    /// The version map staged for commit, if any.
    pub fn staged_version_map(&self) -> Option<&VersionMap> {
        self.staged_versions.as_ref()
    }

    /// Get the pending operations.
    pub fn operations(&self) -> &[TransactionOp] {
        &self.ops
    }

    /// Get the number of pending operations.
    pub fn operation_count(&self) -> usize {
        self.ops.len()
    }

    /// Check if the transaction would change nothing.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.staged_versions.is_none()
    }

    /// Commit the transaction atomically.
    ///
    /// All state writes and the staged version map land together or not at all.
    pub fn commit(self) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }

        let version_bytes = self
            .staged_versions
            .as_ref()
            .map(VersionMap::to_bytes)
            .transpose()?;

        let result: Result<(), TransactionError<Error>> =
            (&self.state_tree, &self.meta_tree).transaction(|(state_tx, meta_tx)| {
                for op in &self.ops {
                    Self::execute_op(state_tx, op)?;
                }
                if let Some(bytes) = &version_bytes {
                    meta_tx.insert(VERSION_MAP_KEY, bytes.as_slice())?;
                }
                Ok(())
            });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }

    /// Discard all buffered writes.
    pub fn rollback(self) {
        // Dropping the transaction discards pending operations
    }

    fn execute_op(
        tx: &TransactionalTree,
        op: &TransactionOp,
    ) -> Result<(), ConflictableTransactionError<Error>> {
        match op {
            TransactionOp::Put { key, value } => {
                tx.insert(key.as_slice(), value.as_slice())?;
            }
            TransactionOp::Delete { key } => {
                tx.remove(key.as_slice())?;
            }
        }
        Ok(())
    }
}
