//! Key-value database abstraction for the snowfall node.
//!
//! The database system is composable and layered:
//!
//! - **MemDb**: in-memory store backed by a `BTreeMap`, used for tests and
//!   ephemeral chains
//! - **PrefixDb**: namespace wrapper that prefixes every key, letting many
//!   logical stores share one physical database
//!
//! Iteration order is always the lexicographic order of keys, which keeps
//! replay and restart behavior deterministic.

mod error;
mod memdb;
mod prefixdb;

pub use error::{DatabaseError, Result};
pub use memdb::MemDb;
pub use prefixdb::PrefixDb;

/// Read access to a key-value store.
pub trait KeyValueReader: Send + Sync {
    /// Returns whether the key exists.
    fn has(&self, key: &[u8]) -> Result<bool>;

    /// Gets the value for the given key, or `None` if absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
}

/// Write access to a key-value store.
pub trait KeyValueWriter: Send + Sync {
    /// Sets the value for the given key.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Deletes the value for the given key. Deleting an absent key is not
    /// an error.
    fn delete(&self, key: &[u8]) -> Result<()>;
}

/// Iterator creation.
pub trait Iterate: Send + Sync {
    /// Iterates over all entries in key order.
    fn iterator(&self) -> Box<dyn DbIterator>;

    /// Iterates over entries whose keys start with `prefix`, in key order.
    fn iterator_with_prefix(&self, prefix: &[u8]) -> Box<dyn DbIterator>;
}

/// Batch creation.
pub trait Batched: Send + Sync {
    /// Creates a new batch for atomic writes.
    fn new_batch(&self) -> Box<dyn Batch>;
}

/// The full database interface.
pub trait Database: KeyValueReader + KeyValueWriter + Iterate + Batched {
    /// Closes the database. Further operations fail with
    /// [`DatabaseError::Closed`].
    fn close(&self) -> Result<()>;

    /// Returns whether the database is closed.
    fn is_closed(&self) -> bool;
}

/// A set of writes applied atomically.
pub trait Batch: Send {
    /// Buffers a put.
    fn put(&mut self, key: &[u8], value: &[u8]);

    /// Buffers a delete.
    fn delete(&mut self, key: &[u8]);

    /// Returns the buffered size in bytes.
    fn size(&self) -> usize;

    /// Applies the buffered operations to the database.
    fn write(&mut self) -> Result<()>;

    /// Clears the buffer for reuse.
    fn reset(&mut self);
}

/// An iterator over key-value pairs.
///
/// Call `next()` before the first `key()`/`value()` access.
pub trait DbIterator: Send {
    /// Advances to the next pair; returns `false` when exhausted.
    fn next(&mut self) -> bool;

    /// The current key. Valid only after `next()` returned `true`.
    fn key(&self) -> &[u8];

    /// The current value. Valid only after `next()` returned `true`.
    fn value(&self) -> &[u8];
}
