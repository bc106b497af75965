//! In-memory database.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    Batch, Batched, Database, DatabaseError, DbIterator, Iterate, KeyValueReader, KeyValueWriter,
    Result,
};

/// An in-memory key-value database backed by a `BTreeMap`.
///
/// Cloning is cheap; clones share the same underlying map.
#[derive(Debug, Clone)]
pub struct MemDb {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl Default for MemDb {
    fn default() -> Self {
        Self::new()
    }
}

impl MemDb {
    /// Creates a new empty in-memory database.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(DatabaseError::Closed)
        } else {
            Ok(())
        }
    }
}

impl KeyValueReader for MemDb {
    fn has(&self, key: &[u8]) -> Result<bool> {
        self.check_closed()?;
        Ok(self.data.read().contains_key(key))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_closed()?;
        Ok(self.data.read().get(key).cloned())
    }
}

impl KeyValueWriter for MemDb {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_closed()?;
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_closed()?;
        self.data.write().remove(key);
        Ok(())
    }
}

impl Iterate for MemDb {
    fn iterator(&self) -> Box<dyn DbIterator> {
        let entries = self
            .data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Box::new(MemIterator::new(entries))
    }

    fn iterator_with_prefix(&self, prefix: &[u8]) -> Box<dyn DbIterator> {
        let entries = self
            .data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Box::new(MemIterator::new(entries))
    }
}

impl Batched for MemDb {
    fn new_batch(&self) -> Box<dyn Batch> {
        Box::new(MemBatch {
            data: self.data.clone(),
            closed: self.closed.clone(),
            ops: Vec::new(),
            size: 0,
        })
    }
}

impl Database for MemDb {
    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

enum MemOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// A batch of buffered writes against a [`MemDb`].
pub struct MemBatch {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    closed: Arc<AtomicBool>,
    ops: Vec<MemOp>,
    size: usize,
}

impl Batch for MemBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.size += key.len() + value.len();
        self.ops.push(MemOp::Put(key.to_vec(), value.to_vec()));
    }

    fn delete(&mut self, key: &[u8]) {
        self.size += key.len();
        self.ops.push(MemOp::Delete(key.to_vec()));
    }

    fn size(&self) -> usize {
        self.size
    }

    fn write(&mut self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DatabaseError::Closed);
        }
        let mut data = self.data.write();
        for op in self.ops.drain(..) {
            match op {
                MemOp::Put(k, v) => {
                    data.insert(k, v);
                }
                MemOp::Delete(k) => {
                    data.remove(&k);
                }
            }
        }
        self.size = 0;
        Ok(())
    }

    fn reset(&mut self) {
        self.ops.clear();
        self.size = 0;
    }
}

struct MemIterator {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    // Starts one before the first entry so the first next() lands on it.
    pos: Option<usize>,
}

impl MemIterator {
    fn new(entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self { entries, pos: None }
    }
}

impl DbIterator for MemIterator {
    fn next(&mut self) -> bool {
        let next = self.pos.map_or(0, |p| p + 1);
        self.pos = Some(next);
        next < self.entries.len()
    }

    fn key(&self) -> &[u8] {
        match self.pos {
            Some(p) if p < self.entries.len() => &self.entries[p].0,
            _ => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match self.pos {
            Some(p) if p < self.entries.len() => &self.entries[p].1,
            _ => &[],
        }
    }
}
