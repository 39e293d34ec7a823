use crate::error::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

const KEY_SITE_RECORD: &[u8] = b"site_record";

/// Durable home of one site's record.
///
/// The record is rewritten wholesale under a single key and flushed before
/// the write returns, so a crash leaves either the old or the new record.
#[derive(Clone)]
pub struct LogStorage {
    db: sled::Db,
    meta_tree: sled::Tree,
}

impl LogStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Storage that disappears when the last handle is dropped.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let meta_tree = db.open_tree("paxos_meta")?;
        Ok(Self { db, meta_tree })
    }

    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        match self.meta_tree.get(KEY_SITE_RECORD)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    pub fn save<T: Serialize>(&self, record: &T) -> Result<(), StorageError> {
        let data = serde_json::to_vec(record)?;
        self.meta_tree.insert(KEY_SITE_RECORD, data)?;
        self.meta_tree.flush()?;
        Ok(())
    }

    /// Forgets any persisted record.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.meta_tree.remove(KEY_SITE_RECORD)?;
        self.db.flush()?;
        Ok(())
    }
}
