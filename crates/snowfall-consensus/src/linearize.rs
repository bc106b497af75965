//! Adapters bridging DAG finalization and linear-chain initialization.
//!
//! The DAG engine finishes by calling `linearize(stop_vertex_id)`; the
//! nested linear VM expects a full `initialize` call. The two shims here
//! translate between the calls, and are the only place the stop vertex
//! crosses the DAG-engine boundary:
//!
//! - [`InitializeOnLinearizeVm`] turns the engine's `linearize` into the
//!   nested VM's `initialize`, forwarding the stop vertex to its sibling
//!   and handing over the initialization parameters it has owned since
//!   construction.
//! - [`LinearizeOnInitializeVm`] turns the nested VM's `initialize` back
//!   into `linearize` on the wrapped VM, keeping only the engine channel:
//!   the handoff semantics are "finalize at the stop vertex and hand me
//!   the channel".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use snowfall_ids::{Id, NodeId};

use crate::context::{ChainContext, VmState};
use crate::metrics::Registry;
use crate::vm::{ChainVm, CommonVm, DagVm, HeightIndexedVm, InitParams, LinearizableVm};
use crate::{Error, Result};

/// Wraps a linearizable VM so a linear engine can drive it through
/// `initialize`.
pub struct LinearizeOnInitializeVm {
    vm: Arc<dyn LinearizableVm>,
    stop_vertex_id: RwLock<Id>,
}

impl LinearizeOnInitializeVm {
    fn new(vm: Arc<dyn LinearizableVm>) -> Self {
        Self {
            vm,
            stop_vertex_id: RwLock::new(Id::EMPTY),
        }
    }

    fn set_stop_vertex(&self, stop_vertex_id: Id) {
        *self.stop_vertex_id.write() = stop_vertex_id;
    }

    /// The stop vertex recorded by the sibling shim.
    pub fn stop_vertex_id(&self) -> Id {
        *self.stop_vertex_id.read()
    }
}

impl CommonVm for LinearizeOnInitializeVm {
    fn initialize(&self, _ctx: Arc<ChainContext>, params: InitParams) -> Result<()> {
        // Every parameter except the engine channel is already owned by
        // the wrapped VM from its own initialization.
        self.vm
            .linearize(self.stop_vertex_id(), params.to_engine)
    }

    fn set_state(&self, state: VmState) -> Result<()> {
        self.vm.set_state(state)
    }

    fn connected(&self, node_id: NodeId, version: &str) -> Result<()> {
        self.vm.connected(node_id, version)
    }

    fn disconnected(&self, node_id: NodeId) -> Result<()> {
        self.vm.disconnected(node_id)
    }

    fn shutdown(&self) -> Result<()> {
        self.vm.shutdown()
    }

    fn health_check(&self) -> Result<serde_json::Value> {
        self.vm.health_check()
    }
}

impl ChainVm for LinearizeOnInitializeVm {}

impl HeightIndexedVm for LinearizeOnInitializeVm {
    fn verify_height_index(&self) -> Result<()> {
        match self.vm.height_index() {
            Some(indexed) => indexed.verify_height_index(),
            None => Err(Error::HeightIndexNotImplemented),
        }
    }

    fn block_id_at_height(&self, height: u64) -> Result<Id> {
        match self.vm.height_index() {
            Some(indexed) => indexed.block_id_at_height(height),
            None => Err(Error::HeightIndexNotImplemented),
        }
    }
}

/// Wraps a DAG VM so the engine's `linearize` initializes the nested
/// linear VM.
pub struct InitializeOnLinearizeVm {
    vm: Arc<dyn LinearizableVm>,
    vm_to_initialize: Arc<dyn ChainVm>,
    vm_to_linearize: Arc<LinearizeOnInitializeVm>,
    ctx: Arc<ChainContext>,
    registry: Arc<Registry>,
    init: InitParams,
    linearized: AtomicBool,
}

impl InitializeOnLinearizeVm {
    /// Builds the shim pair around `vm`.
    ///
    /// `wrap` constructs the outer chain VM (a proposer VM, or the
    /// linearize side directly) around the inner shim; building both
    /// sides here keeps the captured `init` parameters owned by the shim
    /// for the lifetime of the underlying VM.
    pub fn new<F>(
        vm: Arc<dyn LinearizableVm>,
        ctx: Arc<ChainContext>,
        registry: Arc<Registry>,
        init: InitParams,
        wrap: F,
    ) -> Self
    where
        F: FnOnce(Arc<LinearizeOnInitializeVm>) -> Arc<dyn ChainVm>,
    {
        let vm_to_linearize = Arc::new(LinearizeOnInitializeVm::new(vm.clone()));
        let vm_to_initialize = wrap(vm_to_linearize.clone());
        Self {
            vm,
            vm_to_initialize,
            vm_to_linearize,
            ctx,
            registry,
            init,
            linearized: AtomicBool::new(false),
        }
    }

    /// Fixes the stop vertex, installs the metrics gatherer, and
    /// initializes the nested VM with the captured parameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyLinearized` on a second call: the stop
    /// vertex is forwarded exactly once.
    pub fn linearize(&self, stop_vertex_id: Id) -> Result<()> {
        if self.linearized.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyLinearized);
        }
        self.vm_to_linearize.set_stop_vertex(stop_vertex_id);
        self.ctx.set_metrics(self.registry.clone());
        self.vm_to_initialize
            .initialize(self.ctx.clone(), self.init.clone())
    }

    /// The linearize-on-initialize side of the pair.
    pub fn chain_vm(&self) -> Arc<LinearizeOnInitializeVm> {
        self.vm_to_linearize.clone()
    }
}

impl CommonVm for InitializeOnLinearizeVm {
    fn initialize(&self, ctx: Arc<ChainContext>, params: InitParams) -> Result<()> {
        self.vm.initialize(ctx, params)
    }

    fn set_state(&self, state: VmState) -> Result<()> {
        self.vm.set_state(state)
    }

    fn connected(&self, node_id: NodeId, version: &str) -> Result<()> {
        self.vm.connected(node_id, version)
    }

    fn disconnected(&self, node_id: NodeId) -> Result<()> {
        self.vm.disconnected(node_id)
    }

    fn shutdown(&self) -> Result<()> {
        self.vm.shutdown()
    }

    fn health_check(&self) -> Result<serde_json::Value> {
        self.vm.health_check()
    }
}

impl DagVm for InitializeOnLinearizeVm {
    fn parse_tx(&self, bytes: &[u8]) -> Result<Arc<dyn crate::vertex::Tx>> {
        self.vm.parse_tx(bytes)
    }
}
