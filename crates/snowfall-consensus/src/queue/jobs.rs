//! Job types executed by the blocked queue.

use std::sync::Arc;

use snowfall_ids::Id;
use tracing::debug;

use crate::metrics::Counter;
use crate::vertex::{Manager, Tx, Vertex};
use crate::vm::DagVm;
use crate::{Error, Result};

/// A unit of deferred work, reconstructible from its bytes after a
/// process restart.
pub trait Job: Send + Sync {
    /// The id of the container this job accepts.
    fn id(&self) -> Id;

    /// Ids that must be accepted before this job can execute.
    fn missing_dependencies(&self) -> Result<Vec<Id>>;

    /// Executes the job, accepting its container.
    ///
    /// # Errors
    ///
    /// Fails if dependencies are still missing or the container is not in
    /// an acceptable state.
    fn execute(&self) -> Result<()>;

    /// The bytes this job is reconstructed from.
    fn bytes(&self) -> &[u8];
}

/// Reconstructs jobs from their persisted bytes.
///
/// Injected with a setter after queue construction to break the
/// initialization cycle with the VM that persists into the same store.
pub trait JobParser: Send + Sync {
    /// Parses the job serialized in `bytes`.
    fn parse(&self, bytes: &[u8]) -> Result<Box<dyn Job>>;
}

/// Acceptance counters shared by all jobs of one kind.
#[derive(Debug, Clone)]
pub struct JobMetrics {
    /// Containers accepted by executed jobs.
    pub accepted: Arc<Counter>,
    /// Containers dropped because they could not be accepted.
    pub dropped: Arc<Counter>,
}

impl JobMetrics {
    /// Creates counters named `{namespace}_{kind}_accepted` /
    /// `{namespace}_{kind}_dropped`.
    pub fn new(namespace: &str, kind: &str) -> Self {
        Self {
            accepted: Counter::new(
                format!("{namespace}_{kind}_accepted"),
                format!("number of {kind} containers accepted during bootstrap"),
            ),
            dropped: Counter::new(
                format!("{namespace}_{kind}_dropped"),
                format!("number of {kind} containers dropped during bootstrap"),
            ),
        }
    }
}

/// A job that accepts one vertex.
pub struct VertexJob {
    vtx: Arc<dyn Vertex>,
    metrics: JobMetrics,
}

impl VertexJob {
    /// Creates a job accepting `vtx`.
    pub fn new(vtx: Arc<dyn Vertex>, metrics: JobMetrics) -> Self {
        Self { vtx, metrics }
    }
}

impl Job for VertexJob {
    fn id(&self) -> Id {
        self.vtx.id()
    }

    fn missing_dependencies(&self) -> Result<Vec<Id>> {
        let parents = self.vtx.parents()?;
        Ok(parents
            .iter()
            .filter(|p| !p.status().accepted())
            .map(|p| p.id())
            .collect())
    }

    fn execute(&self) -> Result<()> {
        let missing = self.missing_dependencies()?;
        if !missing.is_empty() {
            self.metrics.dropped.inc();
            return Err(Error::DependenciesNotMet(self.vtx.id()));
        }

        let status = self.vtx.status();
        match status {
            crate::choices::Status::Processing => {
                self.vtx.accept()?;
                self.metrics.accepted.inc();
                debug!(vtx_id = %self.vtx.id(), "accepted vertex");
                Ok(())
            }
            crate::choices::Status::Accepted => Ok(()),
            _ => {
                self.metrics.dropped.inc();
                Err(Error::UnexpectedJobStatus {
                    id: self.vtx.id(),
                    status: status.to_string(),
                })
            }
        }
    }

    fn bytes(&self) -> &[u8] {
        self.vtx.bytes()
    }
}

/// A job that accepts one transaction.
pub struct TxJob {
    tx: Arc<dyn Tx>,
    metrics: JobMetrics,
}

impl TxJob {
    /// Creates a job accepting `tx`.
    pub fn new(tx: Arc<dyn Tx>, metrics: JobMetrics) -> Self {
        Self { tx, metrics }
    }
}

impl Job for TxJob {
    fn id(&self) -> Id {
        self.tx.id()
    }

    fn missing_dependencies(&self) -> Result<Vec<Id>> {
        let deps = self.tx.dependencies()?;
        Ok(deps
            .iter()
            .filter(|d| !d.status().accepted())
            .map(|d| d.id())
            .collect())
    }

    fn execute(&self) -> Result<()> {
        let missing = self.missing_dependencies()?;
        if !missing.is_empty() {
            self.metrics.dropped.inc();
            return Err(Error::DependenciesNotMet(self.tx.id()));
        }

        let status = self.tx.status();
        match status {
            crate::choices::Status::Processing => {
                self.tx.accept()?;
                self.metrics.accepted.inc();
                debug!(tx_id = %self.tx.id(), "accepted tx");
                Ok(())
            }
            crate::choices::Status::Accepted => Ok(()),
            _ => {
                self.metrics.dropped.inc();
                Err(Error::UnexpectedJobStatus {
                    id: self.tx.id(),
                    status: status.to_string(),
                })
            }
        }
    }

    fn bytes(&self) -> &[u8] {
        self.tx.bytes()
    }
}

/// Reconstructs [`VertexJob`]s through the vertex manager.
pub struct VtxJobParser {
    manager: Arc<dyn Manager>,
    metrics: JobMetrics,
}

impl VtxJobParser {
    /// Creates a parser backed by `manager`.
    pub fn new(manager: Arc<dyn Manager>, metrics: JobMetrics) -> Self {
        Self { manager, metrics }
    }
}

impl JobParser for VtxJobParser {
    fn parse(&self, bytes: &[u8]) -> Result<Box<dyn Job>> {
        let vtx = self.manager.parse_vtx(bytes)?;
        Ok(Box::new(VertexJob::new(vtx, self.metrics.clone())))
    }
}

/// Reconstructs [`TxJob`]s through the VM.
pub struct TxJobParser {
    vm: Arc<dyn DagVm>,
    metrics: JobMetrics,
}

impl TxJobParser {
    /// Creates a parser backed by `vm`.
    pub fn new(vm: Arc<dyn DagVm>, metrics: JobMetrics) -> Self {
        Self { vm, metrics }
    }
}

impl JobParser for TxJobParser {
    fn parse(&self, bytes: &[u8]) -> Result<Box<dyn Job>> {
        let tx = self.vm.parse_tx(bytes)?;
        Ok(Box::new(TxJob::new(tx, self.metrics.clone())))
    }
}
