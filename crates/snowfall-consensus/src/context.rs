//! Per-chain execution context and shared engine state.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use snowfall_ids::{Id, NodeId};

use crate::metrics::Registry;

/// Lifecycle state published to the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    /// The chain has not started yet.
    Initializing,
    /// The chain is recovering the accepted frontier from peers.
    Bootstrapping,
    /// The chain participates in consensus.
    NormalOp,
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmState::Initializing => write!(f, "Initializing"),
            VmState::Bootstrapping => write!(f, "Bootstrapping"),
            VmState::NormalOp => write!(f, "NormalOp"),
        }
    }
}

/// Identity and lifecycle state of one chain.
#[derive(Debug)]
pub struct ChainContext {
    /// The chain this context belongs to.
    pub chain_id: Id,
    /// The subnet hosting the chain.
    pub subnet_id: Id,
    /// This node's id.
    pub node_id: NodeId,
    state: RwLock<VmState>,
    metrics: RwLock<Option<Arc<Registry>>>,
}

impl ChainContext {
    /// Creates a context in the `Initializing` state.
    pub fn new(chain_id: Id, subnet_id: Id, node_id: NodeId) -> Self {
        Self {
            chain_id,
            subnet_id,
            node_id,
            state: RwLock::new(VmState::Initializing),
            metrics: RwLock::new(None),
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> VmState {
        *self.state.read()
    }

    /// Publishes a new lifecycle state.
    pub fn set_state(&self, state: VmState) {
        *self.state.write() = state;
    }

    /// Installs the metrics registry gathering this chain's counters.
    pub fn set_metrics(&self, registry: Arc<Registry>) {
        *self.metrics.write() = Some(registry);
    }

    /// The installed metrics registry, if any.
    pub fn metrics(&self) -> Option<Arc<Registry>> {
        self.metrics.read().clone()
    }
}

/// Counters shared between the bootstrapper and the consensus engine it
/// hands off to.
///
/// The request id sequence is strictly increasing across both engines so
/// that a response can always be matched to the engine that issued it.
#[derive(Debug, Default)]
pub struct SharedConfig {
    request_id: AtomicU32,
    restarted: AtomicBool,
}

impl SharedConfig {
    /// Creates a fresh shared configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the request id counter. Called once at engine start.
    pub fn set_request_id(&self, request_id: u32) {
        self.request_id.store(request_id, Ordering::SeqCst);
    }

    /// The most recently issued request id.
    pub fn request_id(&self) -> u32 {
        self.request_id.load(Ordering::SeqCst)
    }

    /// Increments the counter and returns the new request id.
    pub fn next_request_id(&self) -> u32 {
        self.request_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether bootstrapping has been restarted at least once. Progress
    /// logs downgrade to debug after a restart.
    pub fn restarted(&self) -> bool {
        self.restarted.load(Ordering::SeqCst)
    }

    /// Marks the bootstrap as restarted.
    pub fn set_restarted(&self, restarted: bool) {
        self.restarted.store(restarted, Ordering::SeqCst);
    }
}

/// Cooperative cancellation probe for long-running loops.
///
/// Workers check [`halted`] at every iteration and return without
/// committing partial state once it turns true.
///
/// [`halted`]: Halter::halted
#[derive(Debug, Clone, Default)]
pub struct Halter {
    halted: Arc<AtomicBool>,
}

impl Halter {
    /// Creates a new, un-halted probe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals the owning worker to stop.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    /// Whether a halt has been requested.
    pub fn halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_state_transitions() {
        let ctx = ChainContext::new(Id::EMPTY, Id::EMPTY, NodeId::EMPTY);
        assert_eq!(ctx.state(), VmState::Initializing);

        ctx.set_state(VmState::Bootstrapping);
        assert_eq!(ctx.state(), VmState::Bootstrapping);

        ctx.set_state(VmState::NormalOp);
        assert_eq!(ctx.state(), VmState::NormalOp);
    }

    #[test]
    fn test_shared_config_request_ids_increase() {
        let shared = SharedConfig::new();
        shared.set_request_id(7);
        assert_eq!(shared.request_id(), 7);
        assert_eq!(shared.next_request_id(), 8);
        assert_eq!(shared.next_request_id(), 9);
        assert_eq!(shared.request_id(), 9);
    }

    #[test]
    fn test_halter() {
        let halter = Halter::new();
        assert!(!halter.halted());

        let shared = halter.clone();
        shared.halt();
        assert!(halter.halted());
    }
}
