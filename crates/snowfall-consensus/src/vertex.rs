//! DAG vertex model and the processing heap.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

use snowfall_ids::Id;

use crate::choices::Decidable;
use crate::Result;

/// A content-addressed vertex in the DAG.
///
/// A vertex's height is its longest-path distance from the genesis
/// vertex, strictly greater than every parent's height. A vertex may only
/// be accepted once all of its parents are accepted.
pub trait Vertex: Decidable {
    /// The canonical serialization of this vertex.
    fn bytes(&self) -> &[u8];

    /// The height of this vertex.
    ///
    /// # Errors
    ///
    /// Fails when the vertex is not known locally (status `Unknown`).
    fn height(&self) -> Result<u64>;

    /// The parent vertices.
    ///
    /// # Errors
    ///
    /// Fails when the vertex is not known locally.
    fn parents(&self) -> Result<Vec<Arc<dyn Vertex>>>;

    /// The transactions carried by this vertex.
    ///
    /// # Errors
    ///
    /// Fails when the vertex is not known locally.
    fn txs(&self) -> Result<Vec<Arc<dyn Tx>>>;
}

/// A content-addressed transaction carried by one or more vertices.
pub trait Tx: Decidable {
    /// The canonical serialization of this transaction.
    fn bytes(&self) -> &[u8];

    /// Transactions that must be accepted before this one.
    ///
    /// Conflict sets are resolved outside the bootstrap path, so most
    /// transactions have no dependencies here.
    fn dependencies(&self) -> Result<Vec<Arc<dyn Tx>>> {
        Ok(Vec::new())
    }
}

/// The vertex store and parser.
pub trait Manager: Send + Sync {
    /// Parses and persists a vertex from its canonical bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` if the bytes do not decode to a vertex.
    fn parse_vtx(&self, bytes: &[u8]) -> Result<Arc<dyn Vertex>>;

    /// Returns the locally stored vertex with the given id, or `None` if
    /// it is not known.
    fn get_vtx(&self, id: Id) -> Option<Arc<dyn Vertex>>;
}

struct HeapEntry {
    height: u64,
    id: Id,
    vtx: Arc<dyn Vertex>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.height == other.height && self.id == other.id
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Deepest vertex first; equal heights pop in ascending id order.
        self.height
            .cmp(&other.height)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A priority queue of vertices, deepest-in-DAG first.
///
/// Processing children before parents minimizes redundant upward
/// traversals. Pushes deduplicate on vertex id.
#[derive(Default)]
pub struct VertexHeap {
    heap: BinaryHeap<HeapEntry>,
    ids: HashSet<Id>,
}

impl VertexHeap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a vertex, returning false if its id is already present.
    ///
    /// Vertices whose height is not yet known (status `Unknown`) sort at
    /// height zero so they surface last.
    pub fn push(&mut self, vtx: Arc<dyn Vertex>) -> bool {
        let id = vtx.id();
        if !self.ids.insert(id) {
            return false;
        }
        let height = vtx.height().unwrap_or(0);
        self.heap.push(HeapEntry { height, id, vtx });
        true
    }

    /// Pops the deepest vertex, or `None` if the heap is empty.
    pub fn pop(&mut self) -> Option<Arc<dyn Vertex>> {
        let entry = self.heap.pop()?;
        self.ids.remove(&entry.id);
        Some(entry.vtx)
    }

    /// Returns whether a vertex with this id is queued.
    pub fn contains(&self, id: &Id) -> bool {
        self.ids.contains(id)
    }

    /// Returns the number of queued vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if no vertices are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
