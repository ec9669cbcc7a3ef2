//! State store implementation.

use super::{StateTransaction, StoreConfig};
use crate::error::Error;
use crate::version::VersionMap;
use sled::{Db, Tree};

/// Tree name for module state.
const STATE_TREE: &str = "state";

/// Tree name for metadata (version map).
const META_TREE: &str = "meta";

/// Key of the persisted version map in the meta tree.
pub(crate) const VERSION_MAP_KEY: &[u8] = b"version_map";

/// Key/value state of every module plus the recorded version map, on sled.
///
/// Module state is opaque bytes. Upgrades mutate it only through a
/// [`StateTransaction`], which applies every write and the new version map
/// in one atomic sled transaction.
pub struct StateStore {
    /// The underlying sled database.
    db: Db,

    /// Tree for module state.
    state_tree: Tree,

    /// Tree for metadata.
    meta_tree: Tree,
}

impl StateStore {
    /// Open or create a state store with the given configuration.
    pub fn open(config: StoreConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let state_tree = db.open_tree(STATE_TREE)?;
        let meta_tree = db.open_tree(META_TREE)?;

        tracing::debug!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            "state store opened"
        );

        Ok(Self {
            db,
            state_tree,
            meta_tree,
        })
    }

    /// Open a temporary store that is deleted on drop.
    pub fn temporary() -> Result<Self, Error> {
        Self::open(StoreConfig::temporary())
    }

    /// Read a state value.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.state_tree.get(key)?.map(|v| v.to_vec()))
    }

    /// Write a state value outside of any upgrade.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.state_tree.insert(key, value)?;
        Ok(())
    }

    /// Delete a state value outside of any upgrade.
    pub fn delete(&self, key: &[u8]) -> Result<(), Error> {
        self.state_tree.remove(key)?;
        Ok(())
    }

    /// Scan all state entries whose key starts with `prefix`, in key order.
    pub fn scan_prefix(
        &self,
        prefix: &[u8],
    ) -> impl Iterator<Item = Result<(Vec<u8>, Vec<u8>), Error>> + '_ {
        self.state_tree
            .scan_prefix(prefix)
            .map(|result| {
                let (key, value) = result?;
                Ok((key.to_vec(), value.to_vec()))
            })
    }

    /// Read the recorded version map.
    ///
    /// A store that never recorded one yields an empty map.
    pub fn version_map(&self) -> Result<VersionMap, Error> {
        match self.meta_tree.get(VERSION_MAP_KEY)? {
            Some(bytes) => VersionMap::from_bytes(&bytes),
            None => Ok(VersionMap::new()),
        }
    }

    /// Begin a transaction.
    pub fn transaction(&self) -> StateTransaction {
        StateTransaction::new(self)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    pub(crate) fn state_tree(&self) -> &Tree {
        &self.state_tree
    }

    pub(crate) fn meta_tree(&self) -> &Tree {
        &self.meta_tree
    }
}
