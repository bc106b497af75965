//! Interfaces between the consensus core and its collaborators.
//!
//! The core calls out through the narrow traits here; everything network-,
//! clock-, and platform-shaped stays behind them. The message-handler
//! capability traits at the bottom default to logging drops, so an engine
//! only overrides the messages it actually consumes.

use std::sync::Arc;
use std::time::Duration;

use snowfall_ids::{Id, NodeId, RequestId};
use tracing::debug;

use crate::vm::{DagVm, Message};
use crate::Result;

/// Maximum number of in-flight `GetAncestors` requests.
pub const MAX_OUTSTANDING_GET_ANCESTORS_REQUESTS: usize = 50;

/// How many executed or fetched containers between progress log lines.
pub const STATUS_UPDATE_FREQUENCY: u64 = 2500;

/// Outbound message sink. Sends are fire-and-forget.
pub trait Sender: Send + Sync {
    /// Requests the vertex `vtx_id` and its ancestors from `peer`.
    fn send_get_ancestors(&self, peer: NodeId, request_id: RequestId, vtx_id: Id);
}

/// The subnet hosting this chain.
pub trait Subnet: Send + Sync {
    /// Records that the given chain has finished bootstrapping.
    fn bootstrapped(&self, chain_id: Id);

    /// Returns whether every chain in the subnet has bootstrapped.
    fn is_bootstrapped(&self) -> bool;
}

/// External timer driving the bootstrap re-poll delay.
pub trait TimeoutRegistrar: Send + Sync {
    /// Schedules a `Timeout` delivery after `duration`.
    fn register_timeout(&self, duration: Duration);
}

/// Tracks connected stake and decides when enough peers are present to
/// begin bootstrapping.
pub trait StartupTracker: Send + Sync {
    /// Records a peer connection.
    fn connected(&self, node_id: NodeId) -> Result<()>;

    /// Records a peer disconnection.
    fn disconnected(&self, node_id: NodeId) -> Result<()>;

    /// Returns whether bootstrapping should begin.
    fn should_start(&self) -> bool;
}

/// Supplies the accepted frontier that seeds a bootstrap round.
///
/// The frontier-voting protocol that produces these ids runs outside the
/// core; a restart queries the source again to pick up new tips.
pub trait FrontierSource: Send + Sync {
    /// The current accepted frontier.
    fn accepted_frontier(&self) -> Result<Vec<Id>>;
}

/// Observes each container as the blocked queue commits it.
pub trait Acceptor: Send + Sync {
    /// Called with the container's id and bytes immediately before its
    /// job executes.
    fn accept(&self, id: Id, bytes: &[u8]) -> Result<()>;
}

/// An [`Acceptor`] that ignores every container.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAcceptor;

impl Acceptor for NoOpAcceptor {
    fn accept(&self, _id: Id, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Handler for `Put` messages.
pub trait PutHandler {
    /// Handles a gossiped or requested container.
    fn put(&mut self, node_id: NodeId, request_id: RequestId, _container: &[u8]) -> Result<()> {
        debug!(%node_id, request_id, "dropping Put message");
        Ok(())
    }
}

/// Handler for consensus queries.
pub trait QueryHandler {
    /// Handles a query carrying the container being voted on.
    fn push_query(
        &mut self,
        node_id: NodeId,
        request_id: RequestId,
        _container: &[u8],
    ) -> Result<()> {
        debug!(%node_id, request_id, "dropping PushQuery message");
        Ok(())
    }

    /// Handles a query referencing a container by id.
    fn pull_query(&mut self, node_id: NodeId, request_id: RequestId, _id: Id) -> Result<()> {
        debug!(%node_id, request_id, "dropping PullQuery message");
        Ok(())
    }
}

/// Handler for `Chits` (vote) messages.
pub trait ChitsHandler {
    /// Handles the votes returned by a queried peer.
    fn chits(&mut self, node_id: NodeId, request_id: RequestId, _votes: Vec<Id>) -> Result<()> {
        debug!(%node_id, request_id, "dropping Chits message");
        Ok(())
    }
}

/// Handler for application-level messages relayed by the network.
pub trait AppHandler {
    /// Handles an application request.
    fn app_request(&mut self, node_id: NodeId, request_id: RequestId, _bytes: &[u8]) -> Result<()> {
        debug!(%node_id, request_id, "dropping AppRequest message");
        Ok(())
    }

    /// Handles an application response.
    fn app_response(&mut self, node_id: NodeId, request_id: RequestId, _bytes: &[u8]) -> Result<()> {
        debug!(%node_id, request_id, "dropping AppResponse message");
        Ok(())
    }

    /// Handles application gossip.
    fn app_gossip(&mut self, node_id: NodeId, _bytes: &[u8]) -> Result<()> {
        debug!(%node_id, "dropping AppGossip message");
        Ok(())
    }
}

/// Handler for state-summary messages used by state sync.
pub trait StateSummaryHandler {
    /// Handles a state summary frontier response.
    fn state_summary_frontier(
        &mut self,
        node_id: NodeId,
        request_id: RequestId,
        _summary: &[u8],
    ) -> Result<()> {
        debug!(%node_id, request_id, "dropping StateSummaryFrontier message");
        Ok(())
    }

    /// Handles an accepted state summary response.
    fn accepted_state_summary(
        &mut self,
        node_id: NodeId,
        request_id: RequestId,
        _ids: Vec<Id>,
    ) -> Result<()> {
        debug!(%node_id, request_id, "dropping AcceptedStateSummary message");
        Ok(())
    }
}

/// The full capability set of an engine that can bootstrap a chain.
///
/// The handler supertraits cover messages the bootstrapper does not
/// consume; their default implementations log and drop.
pub trait BootstrapableEngine:
    PutHandler + QueryHandler + ChitsHandler + AppHandler + StateSummaryHandler
{
    /// Starts bootstrapping with the given initial request id.
    fn start(&mut self, request_id: RequestId) -> Result<()>;

    /// Wipes any persisted bootstrap state.
    fn clear(&mut self) -> Result<()>;

    /// Seeds bootstrapping with the ids accepted by the network.
    fn force_accepted(&mut self, accepted: Vec<Id>) -> Result<()>;

    /// Handles an `Ancestors` response carrying serialized vertices.
    fn ancestors(&mut self, node_id: NodeId, request_id: RequestId, vtxs: Vec<Vec<u8>>)
        -> Result<()>;

    /// Handles a failed `GetAncestors` request.
    fn get_ancestors_failed(&mut self, node_id: NodeId, request_id: RequestId) -> Result<()>;

    /// Handles a peer connection.
    fn connected(&mut self, node_id: NodeId, version: &str) -> Result<()>;

    /// Handles a peer disconnection.
    fn disconnected(&mut self, node_id: NodeId) -> Result<()>;

    /// Handles a registered timeout firing.
    fn timeout(&mut self) -> Result<()>;

    /// Gossips recent containers. No-op during bootstrap.
    fn gossip(&mut self) -> Result<()>;

    /// Shuts down the engine.
    fn shutdown(&mut self) -> Result<()>;

    /// Handles a VM notification.
    fn notify(&mut self, message: Message) -> Result<()>;

    /// Reports engine and VM health.
    fn health_check(&self) -> Result<serde_json::Value>;

    /// The VM this engine drives.
    fn get_vm(&self) -> Arc<dyn DagVm>;
}
