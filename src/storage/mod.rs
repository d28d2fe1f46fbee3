// Storage module - list storage contract and the in-memory engine

pub mod db;
pub mod lock;

use bytes::Bytes;
use thiserror::Error;

pub use db::{current_timestamp_ms, MemoryStorage};
pub use lock::{DbGuard, DbLocks};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("NotFound")]
    NotFound,

    #[error("Corruption: {0}")]
    Corruption(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound)
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, StorageError::Corruption(_))
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Where LINSERT places the new element relative to the pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

/// List operations the command layer needs from a storage engine.
///
/// Every call names its logical database. Absent keys surface as
/// `StorageError::NotFound`; callers decide whether that is benign.
/// A list emptied by any operation ceases to exist.
pub trait ListStorage: Send + Sync {
    fn lpush(&self, db: usize, key: &[u8], values: &[Bytes]) -> StorageResult<usize>;
    fn rpush(&self, db: usize, key: &[u8], values: &[Bytes]) -> StorageResult<usize>;
    /// Push only onto an existing list
    fn lpushx(&self, db: usize, key: &[u8], values: &[Bytes]) -> StorageResult<usize>;
    fn rpushx(&self, db: usize, key: &[u8], values: &[Bytes]) -> StorageResult<usize>;
    /// Pop up to `count` elements from the head
    fn lpop(&self, db: usize, key: &[u8], count: usize) -> StorageResult<Vec<Bytes>>;
    /// Pop up to `count` elements from the tail
    fn rpop(&self, db: usize, key: &[u8], count: usize) -> StorageResult<Vec<Bytes>>;
    fn lrange(&self, db: usize, key: &[u8], start: i64, stop: i64) -> StorageResult<Vec<Bytes>>;
    fn lrem(&self, db: usize, key: &[u8], count: i64, value: &[u8]) -> StorageResult<usize>;
    fn ltrim(&self, db: usize, key: &[u8], start: i64, stop: i64) -> StorageResult<()>;
    /// Out-of-bounds index is reported as `Corruption("index out of range")`
    fn lset(&self, db: usize, key: &[u8], index: i64, value: Bytes) -> StorageResult<()>;
    /// Returns the new length, or -1 when the pivot is missing
    fn linsert(
        &self,
        db: usize,
        key: &[u8],
        position: InsertPosition,
        pivot: &[u8],
        value: Bytes,
    ) -> StorageResult<i64>;
    fn lindex(&self, db: usize, key: &[u8], index: i64) -> StorageResult<Bytes>;
    fn llen(&self, db: usize, key: &[u8]) -> StorageResult<usize>;
    /// Move the tail of `source` to the head of `destination`
    fn rpoplpush(&self, db: usize, source: &[u8], destination: &[u8]) -> StorageResult<Bytes>;

    fn del(&self, db: usize, keys: &[Bytes]) -> StorageResult<usize>;
    fn exists(&self, db: usize, keys: &[Bytes]) -> StorageResult<usize>;
    fn keys(&self, db: usize, pattern: &[u8]) -> StorageResult<Vec<Bytes>>;
    fn db_size(&self, db: usize) -> StorageResult<usize>;
    fn flush_db(&self, db: usize) -> StorageResult<()>;
    fn flush_all(&self) -> StorageResult<()>;
    /// Type name of the value at `key`, `None` when absent
    fn key_type(&self, db: usize, key: &[u8]) -> StorageResult<Option<&'static str>>;
}
