//! Virtual machine traits.
//!
//! The consensus core drives VMs through these interfaces. Calls are
//! synchronous: the core runs on a single cooperative task per chain and
//! the VM is expected to return promptly or honor the halt probe.

use std::sync::Arc;

use snowfall_db::Database;
use snowfall_ids::{Id, NodeId, RequestId};

use crate::context::{ChainContext, VmState};
use crate::vertex::Tx;
use crate::Result;

/// A notification from the VM to its hosting engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// The VM has transactions ready to be issued.
    PendingTxs,
}

/// The channel a VM uses to notify its engine.
pub type ToEngine = tokio::sync::mpsc::UnboundedSender<Message>;

/// A feature extension wired into the VM at initialization.
#[derive(Debug, Clone)]
pub struct Fx {
    /// The extension's id.
    pub id: Id,
}

/// Outbound application-level message sink handed to the VM.
pub trait AppSender: Send + Sync {
    /// Sends an application request to a peer.
    fn send_app_request(&self, peer: NodeId, request_id: RequestId, bytes: Vec<u8>) -> Result<()>;

    /// Sends an application response to a peer.
    fn send_app_response(&self, peer: NodeId, request_id: RequestId, bytes: Vec<u8>) -> Result<()>;

    /// Gossips an application message.
    fn send_app_gossip(&self, bytes: Vec<u8>) -> Result<()>;
}

/// Everything a VM needs to initialize.
///
/// The linearize shim captures one of these at construction and owns it
/// for the full lifetime of the underlying VM.
#[derive(Clone)]
pub struct InitParams {
    /// The chain's database.
    pub db: Arc<dyn Database>,
    /// The genesis state of the chain.
    pub genesis_bytes: Vec<u8>,
    /// Network upgrade configuration.
    pub upgrade_bytes: Vec<u8>,
    /// VM-specific configuration.
    pub config_bytes: Vec<u8>,
    /// Channel for VM-to-engine notifications.
    pub to_engine: ToEngine,
    /// Feature extensions.
    pub fxs: Vec<Fx>,
    /// Application-level message sink.
    pub app_sender: Arc<dyn AppSender>,
}

/// Functionality common to every VM.
pub trait CommonVm: Send + Sync {
    /// Initializes the VM.
    fn initialize(&self, ctx: Arc<ChainContext>, params: InitParams) -> Result<()>;

    /// Publishes a lifecycle state change.
    fn set_state(&self, state: VmState) -> Result<()>;

    /// Called when a peer connects.
    fn connected(&self, node_id: NodeId, version: &str) -> Result<()>;

    /// Called when a peer disconnects.
    fn disconnected(&self, node_id: NodeId) -> Result<()>;

    /// Shuts the VM down.
    fn shutdown(&self) -> Result<()>;

    /// Reports the VM's health.
    fn health_check(&self) -> Result<serde_json::Value>;
}

/// A VM whose history forms a DAG of vertices.
pub trait DagVm: CommonVm {
    /// Parses a transaction from its canonical bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` if the bytes do not decode.
    fn parse_tx(&self, bytes: &[u8]) -> Result<Arc<dyn Tx>>;
}

/// A DAG VM whose history can be cut over to a linear chain.
pub trait LinearizableVm: DagVm {
    /// Finalizes DAG history at `stop_vertex_id` and switches to linear
    /// operation, reporting future work on `to_engine`.
    fn linearize(&self, stop_vertex_id: Id, to_engine: ToEngine) -> Result<()>;

    /// The VM's height index, if it maintains one.
    fn height_index(&self) -> Option<&dyn HeightIndexedVm> {
        None
    }
}

/// A VM driven by a linear-chain engine.
///
/// Only the initialization surface matters to this crate; block building
/// and verification belong to the linear engine.
pub trait ChainVm: CommonVm {}

/// Optional height-to-block index maintained by a chain VM.
pub trait HeightIndexedVm: Send + Sync {
    /// Verifies that the height index is complete.
    fn verify_height_index(&self) -> Result<()>;

    /// Returns the id of the block at the given height.
    fn block_id_at_height(&self, height: u64) -> Result<Id>;
}
