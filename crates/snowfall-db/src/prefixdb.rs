//! Prefix database wrapper.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{
    Batch, Batched, Database, DatabaseError, DbIterator, Iterate, KeyValueReader, KeyValueWriter,
    Result,
};

/// A database wrapper that namespaces all keys under a fixed prefix.
///
/// Multiple logical stores can share one physical database by carving the
/// key space into disjoint prefixes. Closing the wrapper does not close
/// the underlying database, which may be shared.
pub struct PrefixDb {
    prefix: Vec<u8>,
    db: Arc<dyn Database>,
    closed: AtomicBool,
}

impl PrefixDb {
    /// Creates a new prefix database over `db`.
    pub fn new(db: Arc<dyn Database>, prefix: &[u8]) -> Self {
        Self {
            prefix: prefix.to_vec(),
            db,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the prefix applied to every key.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Returns the underlying database.
    pub fn inner(&self) -> Arc<dyn Database> {
        self.db.clone()
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(DatabaseError::Closed)
        } else {
            Ok(())
        }
    }

    fn wrap(&self, key: &[u8]) -> Vec<u8> {
        let mut wrapped = Vec::with_capacity(self.prefix.len() + key.len());
        wrapped.extend_from_slice(&self.prefix);
        wrapped.extend_from_slice(key);
        wrapped
    }
}

impl KeyValueReader for PrefixDb {
    fn has(&self, key: &[u8]) -> Result<bool> {
        self.check_closed()?;
        self.db.has(&self.wrap(key))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_closed()?;
        self.db.get(&self.wrap(key))
    }
}

impl KeyValueWriter for PrefixDb {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_closed()?;
        self.db.put(&self.wrap(key), value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_closed()?;
        self.db.delete(&self.wrap(key))
    }
}

impl Iterate for PrefixDb {
    fn iterator(&self) -> Box<dyn DbIterator> {
        Box::new(StripIterator {
            inner: self.db.iterator_with_prefix(&self.prefix),
            strip: self.prefix.len(),
        })
    }

    fn iterator_with_prefix(&self, prefix: &[u8]) -> Box<dyn DbIterator> {
        Box::new(StripIterator {
            inner: self.db.iterator_with_prefix(&self.wrap(prefix)),
            strip: self.prefix.len(),
        })
    }
}

impl Batched for PrefixDb {
    fn new_batch(&self) -> Box<dyn Batch> {
        Box::new(PrefixBatch {
            prefix: self.prefix.clone(),
            inner: self.db.new_batch(),
        })
    }
}

impl Database for PrefixDb {
    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.db.is_closed()
    }
}

struct PrefixBatch {
    prefix: Vec<u8>,
    inner: Box<dyn Batch>,
}

impl PrefixBatch {
    fn wrap(&self, key: &[u8]) -> Vec<u8> {
        let mut wrapped = Vec::with_capacity(self.prefix.len() + key.len());
        wrapped.extend_from_slice(&self.prefix);
        wrapped.extend_from_slice(key);
        wrapped
    }
}

impl Batch for PrefixBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        let wrapped = self.wrap(key);
        self.inner.put(&wrapped, value);
    }

    fn delete(&mut self, key: &[u8]) {
        let wrapped = self.wrap(key);
        self.inner.delete(&wrapped);
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn write(&mut self) -> Result<()> {
        self.inner.write()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

struct StripIterator {
    inner: Box<dyn DbIterator>,
    strip: usize,
}

impl DbIterator for StripIterator {
    fn next(&mut self) -> bool {
        self.inner.next()
    }

    fn key(&self) -> &[u8] {
        let key = self.inner.key();
        if key.len() >= self.strip {
            &key[self.strip..]
        } else {
            &[]
        }
    }

    fn value(&self) -> &[u8] {
        self.inner.value()
    }
}
