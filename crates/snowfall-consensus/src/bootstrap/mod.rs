//! DAG bootstrapper.
//!
//! A joining node recovers the accepted frontier of the DAG from its
//! peers: it fetches unknown vertices with `GetAncestors`, traverses the
//! responses child-to-parent, queues every reachable vertex and
//! transaction for execution, and executes the queues once nothing is
//! missing. Control then passes to the next engine through the
//! on-finished callback.

mod requests;

pub use requests::OutstandingRequests;

use std::collections::{BTreeSet, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use snowfall_ids::{Id, NodeId, RequestId};
use tracing::{debug, info};

use crate::beacons::BeaconSet;
use crate::choices::Status;
use crate::common::{
    Acceptor, BootstrapableEngine, FrontierSource, Sender, StartupTracker, Subnet,
    TimeoutRegistrar, MAX_OUTSTANDING_GET_ANCESTORS_REQUESTS, STATUS_UPDATE_FREQUENCY,
};
use crate::context::{ChainContext, Halter, SharedConfig, VmState};
use crate::metrics::{Counter, Registry};
use crate::queue::{JobMetrics, Jobs, TxJob, TxJobParser, VertexJob, VtxJobParser};
use crate::vertex::{Manager, Vertex, VertexHeap};
use crate::vm::{DagVm, Message};
use crate::{Error, Result};

// Processed vertices are cached where height = c * STRIPE_DISTANCE + w
// for w < STRIPE_WIDTH. This forms a stripe of cached vertices every
// STRIPE_DISTANCE heights, bounding the number of repeated upward DAG
// traversals.
const STRIPE_DISTANCE: u64 = 2000;
const STRIPE_WIDTH: u64 = 5;
const CACHE_SIZE: usize = 100_000;

// Delay before re-polling a subnet that has not finished syncing.
const BOOTSTRAPPING_DELAY: Duration = Duration::from_secs(10);

/// Invoked with the final shared request id when bootstrapping completes.
pub type OnFinished = Box<dyn FnMut(RequestId) -> Result<()> + Send>;

/// Collaborators and tunables for a [`Bootstrapper`].
pub struct Config {
    /// The chain's identity and lifecycle state.
    pub ctx: Arc<ChainContext>,
    /// Trusted peers to fetch from.
    pub beacons: Arc<BeaconSet>,
    /// Decides when enough peers are connected to begin.
    pub startup_tracker: Arc<dyn StartupTracker>,
    /// Outbound message sink.
    pub sender: Arc<dyn Sender>,
    /// The subnet hosting this chain.
    pub subnet: Arc<dyn Subnet>,
    /// Timer for the subnet re-poll delay.
    pub timer: Arc<dyn TimeoutRegistrar>,
    /// Supplies the accepted frontier each bootstrap round starts from.
    pub frontier: Arc<dyn FrontierSource>,
    /// Vertex store and parser.
    pub manager: Arc<dyn Manager>,
    /// The chain's VM.
    pub vm: Arc<dyn DagVm>,
    /// Request id counter shared with the next engine.
    pub shared: Arc<SharedConfig>,
    /// Observes accepted transactions.
    pub decision_acceptor: Arc<dyn Acceptor>,
    /// Observes accepted vertices.
    pub consensus_acceptor: Arc<dyn Acceptor>,
    /// Queue of vertices awaiting execution.
    pub vtx_blocked: Jobs,
    /// Queue of transactions awaiting execution.
    pub tx_blocked: Jobs,
    /// Upper bound on containers accepted from one `Ancestors` message.
    pub ancestors_max_containers_received: usize,
    /// Whether to restart when a round still accepts many new vertices.
    pub retry_bootstrap: bool,
}

/// Counters exported by the bootstrapper.
pub struct Metrics {
    /// Vertices fetched and queued.
    pub fetched_vts: Arc<Counter>,
    /// Transactions fetched and queued.
    pub fetched_txs: Arc<Counter>,
    /// Acceptance counters for vertex jobs.
    pub vtx_jobs: JobMetrics,
    /// Acceptance counters for transaction jobs.
    pub tx_jobs: JobMetrics,
}

impl Metrics {
    fn new(namespace: &str, registry: &Registry) -> Self {
        let fetched_vts = Counter::new(
            format!("{namespace}_fetched_vts"),
            "number of vertices fetched during bootstrap",
        );
        let fetched_txs = Counter::new(
            format!("{namespace}_fetched_txs"),
            "number of transactions fetched during bootstrap",
        );
        let vtx_jobs = JobMetrics::new(namespace, "vtx");
        let tx_jobs = JobMetrics::new(namespace, "tx");

        registry.register(fetched_vts.clone());
        registry.register(fetched_txs.clone());
        registry.register(vtx_jobs.accepted.clone());
        registry.register(vtx_jobs.dropped.clone());
        registry.register(tx_jobs.accepted.clone());
        registry.register(tx_jobs.dropped.clone());

        Self {
            fetched_vts,
            fetched_txs,
            vtx_jobs,
            tx_jobs,
        }
    }
}

/// The bootstrapper state machine.
///
/// All state is owned here and mutated from the chain's single
/// cooperative task; collaborators are called synchronously.
pub struct Bootstrapper {
    ctx: Arc<ChainContext>,
    beacons: Arc<BeaconSet>,
    startup_tracker: Arc<dyn StartupTracker>,
    sender: Arc<dyn Sender>,
    subnet: Arc<dyn Subnet>,
    timer: Arc<dyn TimeoutRegistrar>,
    frontier: Arc<dyn FrontierSource>,
    manager: Arc<dyn Manager>,
    vm: Arc<dyn DagVm>,
    shared: Arc<SharedConfig>,
    decision_acceptor: Arc<dyn Acceptor>,
    consensus_acceptor: Arc<dyn Acceptor>,
    ancestors_max_containers_received: usize,
    retry_bootstrap: bool,

    vtx_blocked: Jobs,
    tx_blocked: Jobs,

    outstanding_requests: OutstandingRequests,
    /// Vertices awaiting an outbound fetch slot. Disjoint from the set of
    /// vertices with an in-flight request.
    need_to_fetch: BTreeSet<Id>,
    /// Vertices recently traversed, recorded only at stripe heights.
    processed_cache: LruCache<Id, ()>,
    /// Vertices executed by the previous round.
    executed_state_transitions: usize,

    started: bool,
    awaiting_timeout: bool,
    halter: Halter,
    metrics: Metrics,
    on_finished: OnFinished,
}

impl Bootstrapper {
    /// Creates a bootstrapper, wiring the job parsers into the queues and
    /// registering its counters with `registry`.
    pub fn new(mut config: Config, registry: &Registry, on_finished: OnFinished) -> Self {
        let metrics = Metrics::new("bs", registry);

        config.vtx_blocked.set_parser(Arc::new(VtxJobParser::new(
            config.manager.clone(),
            metrics.vtx_jobs.clone(),
        )));
        config.tx_blocked.set_parser(Arc::new(TxJobParser::new(
            config.vm.clone(),
            metrics.tx_jobs.clone(),
        )));

        let cache_size = NonZeroUsize::new(CACHE_SIZE).expect("cache size is nonzero");
        Self {
            ctx: config.ctx,
            beacons: config.beacons,
            startup_tracker: config.startup_tracker,
            sender: config.sender,
            subnet: config.subnet,
            timer: config.timer,
            frontier: config.frontier,
            manager: config.manager,
            vm: config.vm,
            shared: config.shared,
            decision_acceptor: config.decision_acceptor,
            consensus_acceptor: config.consensus_acceptor,
            ancestors_max_containers_received: config.ancestors_max_containers_received,
            retry_bootstrap: config.retry_bootstrap,
            vtx_blocked: config.vtx_blocked,
            tx_blocked: config.tx_blocked,
            outstanding_requests: OutstandingRequests::new(),
            need_to_fetch: BTreeSet::new(),
            processed_cache: LruCache::new(cache_size),
            executed_state_transitions: usize::MAX,
            started: false,
            awaiting_timeout: false,
            halter: Halter::new(),
            metrics,
            on_finished,
        }
    }

    /// Starts bootstrapping with the given initial request id.
    pub fn start(&mut self, request_id: RequestId) -> Result<()> {
        info!(chain_id = %self.ctx.chain_id, "starting bootstrap");

        self.ctx.set_state(VmState::Bootstrapping);
        self.vm.set_state(VmState::Bootstrapping)?;
        self.shared.set_request_id(request_id);

        if !self.startup_tracker.should_start() {
            return Ok(());
        }
        self.started = true;
        self.startup()
    }

    fn startup(&mut self) -> Result<()> {
        let accepted = self.frontier.accepted_frontier()?;
        self.force_accepted(accepted)
    }

    fn restart(&mut self, reset: bool) -> Result<()> {
        if reset {
            debug!("checking for new frontiers");
            self.shared.set_restarted(true);
        }
        self.startup()
    }

    /// Wipes the persisted bootstrap queues.
    pub fn clear(&mut self) -> Result<()> {
        self.vtx_blocked.clear()?;
        self.tx_blocked.clear()
    }

    /// Seeds bootstrapping with the vertex ids accepted by the network,
    /// together with any missing ids persisted from an earlier run.
    pub fn force_accepted(&mut self, accepted: Vec<Id>) -> Result<()> {
        let mut pending = self.vtx_blocked.missing_ids();
        pending.extend(accepted.iter().copied());
        debug!(
            num_missing = pending.len(),
            num_accepted = accepted.len(),
            "starting bootstrapping"
        );

        let mut to_process: Vec<Arc<dyn Vertex>> = Vec::with_capacity(pending.len());
        for vtx_id in pending {
            match self.manager.get_vtx(vtx_id) {
                Some(vtx) => {
                    if vtx.status().accepted() {
                        self.vtx_blocked.remove_missing_id(vtx_id);
                    } else {
                        to_process.push(vtx);
                    }
                }
                None => {
                    self.vtx_blocked.add_missing_id(vtx_id);
                    self.need_to_fetch.insert(vtx_id);
                }
            }
        }
        self.process(to_process)
    }

    /// Queues the given vertices for fetching, then issues requests until
    /// either nothing is left to fetch or the outstanding limit is hit.
    fn fetch(&mut self, vtx_ids: Vec<Id>) -> Result<()> {
        self.need_to_fetch.extend(vtx_ids);

        while self.outstanding_requests.len() < MAX_OUTSTANDING_GET_ANCESTORS_REQUESTS {
            let Some(vtx_id) = self.need_to_fetch.iter().next().copied() else {
                break;
            };
            self.need_to_fetch.remove(&vtx_id);

            // Already requested.
            if self.outstanding_requests.contains(&vtx_id) {
                continue;
            }
            // Already stored locally.
            if self.manager.get_vtx(vtx_id).is_some() {
                continue;
            }

            let peers = self
                .beacons
                .sample(1)
                .map_err(|_| Error::NoBeacons(vtx_id))?;
            let peer = peers[0];
            let request_id = self.shared.next_request_id();

            self.outstanding_requests.add(peer, request_id, vtx_id)?;
            self.sender.send_get_ancestors(peer, request_id, vtx_id);
        }
        self.check_finish()
    }

    /// Handles an `Ancestors` response. `vtxs[0]` must be the vertex
    /// requested by the matching `GetAncestors`; every later entry must
    /// be a parent of an earlier one.
    pub fn ancestors(
        &mut self,
        node_id: NodeId,
        request_id: RequestId,
        mut vtxs: Vec<Vec<u8>>,
    ) -> Result<()> {
        if vtxs.is_empty() {
            debug!(%node_id, request_id, "Ancestors contains no vertices");
            return self.get_ancestors_failed(node_id, request_id);
        }
        if vtxs.len() > self.ancestors_max_containers_received {
            debug!(
                %node_id,
                request_id,
                num_ignored = vtxs.len() - self.ancestors_max_containers_received,
                "ignoring containers in Ancestors"
            );
            vtxs.truncate(self.ancestors_max_containers_received);
        }

        let requested_vtx_id = self.outstanding_requests.remove(node_id, request_id);
        let vtx = match self.manager.parse_vtx(&vtxs[0]) {
            Ok(vtx) => vtx,
            Err(err) => {
                return match requested_vtx_id {
                    Some(requested) => {
                        debug!(%node_id, request_id, vtx_id = %requested, %err,
                            "failed to parse requested vertex");
                        self.fetch(vec![requested])
                    }
                    None => {
                        debug!(%node_id, request_id, %err, "failed to parse unrequested vertex");
                        Ok(())
                    }
                };
            }
        };

        let vtx_id = vtx.id();
        match requested_vtx_id {
            Some(requested) if requested != vtx_id => {
                debug!(%node_id, request_id, %vtx_id, "received incorrect vertex");
                return self.fetch(vec![requested]);
            }
            None if !self.outstanding_requests.contains(&vtx_id)
                && !self.need_to_fetch.contains(&vtx_id) =>
            {
                debug!(%node_id, request_id, %vtx_id, "received un-needed vertex");
                return Ok(());
            }
            _ => {}
        }

        // An entry answering a different outstanding request is left in
        // the table so a real response cannot be displaced by a byzantine
        // Ancestors message forcing one-vertex-at-a-time bootstrapping.
        self.need_to_fetch.remove(&vtx_id);

        let mut process_vertices: Vec<Arc<dyn Vertex>> = Vec::with_capacity(vtxs.len());
        let mut eligible: HashSet<Id> = vtx.parents()?.iter().map(|p| p.id()).collect();
        process_vertices.push(vtx);

        for bytes in &vtxs[1..] {
            let vtx = match self.manager.parse_vtx(bytes) {
                Ok(vtx) => vtx,
                Err(err) => {
                    debug!(%node_id, request_id, %err, "failed to parse vertex");
                    break;
                }
            };
            let vtx_id = vtx.id();
            // A vertex outside the parent-linked chain invalidates the
            // rest of the message.
            if !eligible.remove(&vtx_id) {
                debug!(%node_id, request_id, %vtx_id,
                    "received vertex that should not have been included");
                break;
            }
            for parent in vtx.parents()? {
                eligible.insert(parent.id());
            }
            self.need_to_fetch.remove(&vtx_id);
            process_vertices.push(vtx);
        }

        self.process(process_vertices)
    }

    /// Handles a failed `GetAncestors` request by re-fetching its vertex.
    pub fn get_ancestors_failed(&mut self, node_id: NodeId, request_id: RequestId) -> Result<()> {
        match self.outstanding_requests.remove(node_id, request_id) {
            Some(vtx_id) => self.fetch(vec![vtx_id]),
            None => {
                debug!(%node_id, request_id,
                    "skipping GetAncestorsFailed call: no matching outstanding request");
                Ok(())
            }
        }
    }

    /// Traverses the given vertices toward the accepted frontier, queuing
    /// everything reachable and recording what still must be fetched.
    fn process(&mut self, vtxs: Vec<Arc<dyn Vertex>>) -> Result<()> {
        // Deepest-first processing dedups sibling traversals before their
        // shared parents surface.
        let mut to_process = VertexHeap::new();
        for vtx in vtxs {
            let vtx_id = vtx.id();
            if self.processed_cache.get(&vtx_id).is_some() {
                self.vtx_blocked.remove_missing_id(vtx_id);
            } else {
                to_process.push(vtx);
            }
        }

        let mut vtx_height_set: HashSet<Id> = HashSet::new();
        let mut prev_height = 0u64;

        while let Some(vtx) = to_process.pop() {
            if self.halter.halted() {
                return Ok(());
            }

            let vtx_id = vtx.id();
            match vtx.status() {
                Status::Unknown => {
                    self.vtx_blocked.add_missing_id(vtx_id);
                    self.need_to_fetch.insert(vtx_id);
                }
                Status::Rejected => {
                    return Err(Error::RejectedVertexReachable(vtx_id));
                }
                Status::Processing => {
                    self.need_to_fetch.remove(&vtx_id);
                    self.vtx_blocked.remove_missing_id(vtx_id);

                    let job = VertexJob::new(vtx.clone(), self.metrics.vtx_jobs.clone());
                    if !self.vtx_blocked.push(&job)? {
                        // Already queued: its transactions were pushed and
                        // its parents traversed the first time around.
                        continue;
                    }

                    for tx in vtx.txs()? {
                        let job = TxJob::new(tx, self.metrics.tx_jobs.clone());
                        if self.tx_blocked.push(&job)? {
                            self.metrics.fetched_txs.inc();
                        }
                    }
                    self.metrics.fetched_vts.inc();

                    let fetched_so_far = self.vtx_blocked.len() as u64;
                    if fetched_so_far % STATUS_UPDATE_FREQUENCY == 0 {
                        if self.shared.restarted() {
                            debug!(num_fetched = fetched_so_far, "fetched vertices");
                        } else {
                            info!(num_fetched = fetched_so_far, "fetched vertices");
                        }
                    }

                    for parent in vtx.parents()? {
                        let parent_id = parent.id();
                        if self.processed_cache.get(&parent_id).is_none()
                            && !vtx_height_set.contains(&parent_id)
                        {
                            to_process.push(parent);
                        }
                    }

                    let height = vtx.height()?;
                    if height % STRIPE_DISTANCE < STRIPE_WIDTH {
                        self.processed_cache.put(vtx_id, ());
                    }
                    if height == prev_height {
                        vtx_height_set.insert(vtx_id);
                    } else {
                        prev_height = height;
                        vtx_height_set.clear();
                        vtx_height_set.insert(vtx_id);
                    }
                }
                // Already final: the traversal stops here.
                Status::Accepted => {}
            }
        }

        self.tx_blocked.commit()?;
        self.vtx_blocked.commit()?;

        self.fetch(Vec::new())
    }

    /// Executes the blocked queues and finishes bootstrapping if nothing
    /// is missing and the retry criterion has converged.
    fn check_finish(&mut self) -> Result<()> {
        if self.is_bootstrapped()
            || !self.vtx_blocked.missing_ids().is_empty()
            || self.awaiting_timeout
        {
            return Ok(());
        }

        let restarted = self.shared.restarted();
        let halter = self.halter.clone();

        if restarted {
            debug!("executing transactions");
        } else {
            info!("executing transactions");
        }
        let decision_acceptor = self.decision_acceptor.clone();
        self.tx_blocked
            .execute_all(&halter, restarted, &[decision_acceptor.as_ref()])?;
        if halter.halted() {
            return Ok(());
        }

        if restarted {
            debug!("executing vertices");
        } else {
            info!("executing vertices");
        }
        let consensus_acceptor = self.consensus_acceptor.clone();
        let executed = self
            .vtx_blocked
            .execute_all(&halter, restarted, &[consensus_acceptor.as_ref()])?;
        if halter.halted() {
            return Ok(());
        }

        let previously_executed = self.executed_state_transitions;
        self.executed_state_transitions = executed;

        // Requiring each retry to accept at least half as many vertices
        // as the previous round bounds the number of retries
        // logarithmically in the initial backlog, even while new vertices
        // keep being issued.
        if executed > 0 && executed < previously_executed / 2 && self.retry_bootstrap {
            debug!("checking for more vertices before finishing bootstrapping");
            return self.restart(true);
        }

        self.subnet.bootstrapped(self.ctx.chain_id);
        self.processed_cache.clear();

        // If the subnet hasn't finished bootstrapping, stay in syncing and
        // re-poll for a fresher tip after the delay.
        if !self.subnet.is_bootstrapped() {
            if restarted {
                debug!("waiting for the remaining chains in this subnet to finish syncing");
            } else {
                info!("waiting for the remaining chains in this subnet to finish syncing");
            }
            self.timer.register_timeout(BOOTSTRAPPING_DELAY);
            self.awaiting_timeout = true;
            return Ok(());
        }
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        self.ctx.set_state(VmState::NormalOp);
        (self.on_finished)(self.shared.request_id())
    }

    fn is_bootstrapped(&self) -> bool {
        self.ctx.state() == VmState::NormalOp
    }

    /// Handles the registered timeout firing.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnexpectedTimeout` if no timeout was pending.
    pub fn timeout(&mut self) -> Result<()> {
        if !self.awaiting_timeout {
            return Err(Error::UnexpectedTimeout);
        }
        self.awaiting_timeout = false;

        if !self.subnet.is_bootstrapped() {
            return self.restart(true);
        }
        self.finish()
    }

    /// Handles a peer connection.
    pub fn connected(&mut self, node_id: NodeId, version: &str) -> Result<()> {
        self.vm.connected(node_id, version)?;
        self.startup_tracker.connected(node_id)?;

        if self.started || !self.startup_tracker.should_start() {
            return Ok(());
        }
        self.started = true;
        self.startup()
    }

    /// Handles a peer disconnection.
    pub fn disconnected(&mut self, node_id: NodeId) -> Result<()> {
        self.vm.disconnected(node_id)?;
        self.startup_tracker.disconnected(node_id)
    }

    /// Shuts down the bootstrapper and its VM.
    pub fn shutdown(&mut self) -> Result<()> {
        info!("shutting down bootstrapper");
        self.vm.shutdown()
    }

    /// Reports bootstrapper and VM health.
    pub fn health_check(&self) -> Result<serde_json::Value> {
        let vm = self.vm.health_check()?;
        Ok(serde_json::json!({
            "consensus": {},
            "vm": vm,
        }))
    }

    /// Signals the bootstrapper to stop at the next loop iteration.
    pub fn halt(&self) {
        self.halter.halt();
    }

    /// Whether a halt has been requested.
    pub fn halted(&self) -> bool {
        self.halter.halted()
    }

    /// The wrapped VM.
    pub fn vm(&self) -> &Arc<dyn DagVm> {
        &self.vm
    }

    /// The bootstrapper's metric counters.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The number of in-flight `GetAncestors` requests.
    pub fn num_outstanding_requests(&self) -> usize {
        self.outstanding_requests.len()
    }

    /// Whether the vertex is queued for an outbound fetch.
    pub fn is_awaiting_fetch(&self, vtx_id: &Id) -> bool {
        self.need_to_fetch.contains(vtx_id)
    }

    /// Whether a timeout is currently pending.
    pub fn awaiting_timeout(&self) -> bool {
        self.awaiting_timeout
    }
}

impl crate::common::PutHandler for Bootstrapper {}
impl crate::common::QueryHandler for Bootstrapper {}
impl crate::common::ChitsHandler for Bootstrapper {}
impl crate::common::AppHandler for Bootstrapper {}
impl crate::common::StateSummaryHandler for Bootstrapper {}

impl BootstrapableEngine for Bootstrapper {
    fn start(&mut self, request_id: RequestId) -> Result<()> {
        Bootstrapper::start(self, request_id)
    }

    fn clear(&mut self) -> Result<()> {
        Bootstrapper::clear(self)
    }

    fn force_accepted(&mut self, accepted: Vec<Id>) -> Result<()> {
        Bootstrapper::force_accepted(self, accepted)
    }

    fn ancestors(
        &mut self,
        node_id: NodeId,
        request_id: RequestId,
        vtxs: Vec<Vec<u8>>,
    ) -> Result<()> {
        Bootstrapper::ancestors(self, node_id, request_id, vtxs)
    }

    fn get_ancestors_failed(&mut self, node_id: NodeId, request_id: RequestId) -> Result<()> {
        Bootstrapper::get_ancestors_failed(self, node_id, request_id)
    }

    fn connected(&mut self, node_id: NodeId, version: &str) -> Result<()> {
        Bootstrapper::connected(self, node_id, version)
    }

    fn disconnected(&mut self, node_id: NodeId) -> Result<()> {
        Bootstrapper::disconnected(self, node_id)
    }

    fn timeout(&mut self) -> Result<()> {
        Bootstrapper::timeout(self)
    }

    fn gossip(&mut self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        Bootstrapper::shutdown(self)
    }

    fn notify(&mut self, _message: Message) -> Result<()> {
        Ok(())
    }

    fn health_check(&self) -> Result<serde_json::Value> {
        Bootstrapper::health_check(self)
    }

    fn get_vm(&self) -> Arc<dyn DagVm> {
        self.vm.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacons::Beacon;
    use crate::choices::Decidable;
    use crate::common::NoOpAcceptor;
    use crate::vertex::Tx;
    use crate::vm::{CommonVm, InitParams};
    use parking_lot::RwLock;
    use snowfall_db::{Database, MemDb, PrefixDb};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MiniVertex {
        id: Id,
        bytes: Vec<u8>,
        height: u64,
        parents: Vec<Arc<MiniVertex>>,
        status: RwLock<Status>,
    }

    impl MiniVertex {
        fn new(byte: u8, height: u64, parents: Vec<Arc<MiniVertex>>) -> Arc<Self> {
            Arc::new(Self {
                id: Id::from_bytes([byte; 32]),
                bytes: vec![byte],
                height,
                parents,
                status: RwLock::new(Status::Unknown),
            })
        }
    }

    impl crate::choices::Decidable for MiniVertex {
        fn id(&self) -> Id {
            self.id
        }

        fn status(&self) -> Status {
            *self.status.read()
        }

        fn accept(&self) -> Result<()> {
            *self.status.write() = Status::Accepted;
            Ok(())
        }

        fn reject(&self) -> Result<()> {
            *self.status.write() = Status::Rejected;
            Ok(())
        }
    }

    impl Vertex for MiniVertex {
        fn bytes(&self) -> &[u8] {
            &self.bytes
        }

        fn height(&self) -> Result<u64> {
            Ok(self.height)
        }

        fn parents(&self) -> Result<Vec<Arc<dyn Vertex>>> {
            Ok(self
                .parents
                .iter()
                .map(|p| p.clone() as Arc<dyn Vertex>)
                .collect())
        }

        fn txs(&self) -> Result<Vec<Arc<dyn Tx>>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct MiniManager {
        by_bytes: RwLock<HashMap<Vec<u8>, Arc<MiniVertex>>>,
        stored: RwLock<HashMap<Id, Arc<MiniVertex>>>,
    }

    impl MiniManager {
        fn register(&self, vtx: &Arc<MiniVertex>) {
            self.by_bytes.write().insert(vtx.bytes.clone(), vtx.clone());
        }

        fn store(&self, vtx: &Arc<MiniVertex>) {
            self.stored.write().insert(vtx.id, vtx.clone());
        }
    }

    impl Manager for MiniManager {
        fn parse_vtx(&self, bytes: &[u8]) -> Result<Arc<dyn Vertex>> {
            let vtx = self
                .by_bytes
                .read()
                .get(bytes)
                .cloned()
                .ok_or_else(|| Error::Parse("unknown vertex bytes".into()))?;
            if vtx.status() == Status::Unknown {
                *vtx.status.write() = Status::Processing;
            }
            self.stored.write().insert(vtx.id, vtx.clone());
            Ok(vtx)
        }

        fn get_vtx(&self, id: Id) -> Option<Arc<dyn Vertex>> {
            self.stored
                .read()
                .get(&id)
                .map(|v| v.clone() as Arc<dyn Vertex>)
        }
    }

    #[derive(Default)]
    struct MiniSender {
        sent: AtomicUsize,
    }

    impl Sender for MiniSender {
        fn send_get_ancestors(&self, _peer: NodeId, _request_id: RequestId, _vtx_id: Id) {
            self.sent.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MiniSubnet;

    impl Subnet for MiniSubnet {
        fn bootstrapped(&self, _chain_id: Id) {}

        fn is_bootstrapped(&self) -> bool {
            false
        }
    }

    struct MiniTimer;

    impl TimeoutRegistrar for MiniTimer {
        fn register_timeout(&self, _duration: Duration) {}
    }

    struct MiniTracker;

    impl StartupTracker for MiniTracker {
        fn connected(&self, _node_id: NodeId) -> Result<()> {
            Ok(())
        }

        fn disconnected(&self, _node_id: NodeId) -> Result<()> {
            Ok(())
        }

        fn should_start(&self) -> bool {
            true
        }
    }

    struct MiniFrontier;

    impl FrontierSource for MiniFrontier {
        fn accepted_frontier(&self) -> Result<Vec<Id>> {
            Ok(Vec::new())
        }
    }

    struct MiniVm;

    impl CommonVm for MiniVm {
        fn initialize(&self, _ctx: Arc<ChainContext>, _params: InitParams) -> Result<()> {
            Ok(())
        }

        fn set_state(&self, _state: VmState) -> Result<()> {
            Ok(())
        }

        fn connected(&self, _node_id: NodeId, _version: &str) -> Result<()> {
            Ok(())
        }

        fn disconnected(&self, _node_id: NodeId) -> Result<()> {
            Ok(())
        }

        fn shutdown(&self) -> Result<()> {
            Ok(())
        }

        fn health_check(&self) -> Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
    }

    impl DagVm for MiniVm {
        fn parse_tx(&self, _bytes: &[u8]) -> Result<Arc<dyn Tx>> {
            Err(Error::Parse("no txs in mini VM".into()))
        }
    }

    struct Mini {
        bootstrapper: Bootstrapper,
        manager: Arc<MiniManager>,
        sender: Arc<MiniSender>,
    }

    fn mini(num_beacons: usize) -> Mini {
        let db: Arc<dyn Database> = Arc::new(MemDb::new());
        let manager = Arc::new(MiniManager::default());
        let sender = Arc::new(MiniSender::default());

        let mut beacons = BeaconSet::new();
        for i in 0..num_beacons {
            beacons
                .add(Beacon::new(
                    NodeId::from_bytes([i as u8 + 1; 20]),
                    "0.0.0.0:9650".parse().unwrap(),
                ))
                .unwrap();
        }

        let config = Config {
            ctx: Arc::new(ChainContext::new(
                Id::from_bytes([0xcc; 32]),
                Id::from_bytes([0xdd; 32]),
                NodeId::EMPTY,
            )),
            beacons: Arc::new(beacons),
            startup_tracker: Arc::new(MiniTracker),
            sender: sender.clone(),
            subnet: Arc::new(MiniSubnet),
            timer: Arc::new(MiniTimer),
            frontier: Arc::new(MiniFrontier),
            manager: manager.clone(),
            vm: Arc::new(MiniVm),
            shared: Arc::new(SharedConfig::new()),
            decision_acceptor: Arc::new(NoOpAcceptor),
            consensus_acceptor: Arc::new(NoOpAcceptor),
            vtx_blocked: Jobs::new(Arc::new(PrefixDb::new(db.clone(), b"vtx/"))).unwrap(),
            tx_blocked: Jobs::new(Arc::new(PrefixDb::new(db, b"tx/"))).unwrap(),
            ancestors_max_containers_received: 2048,
            retry_bootstrap: false,
        };

        let bootstrapper = Bootstrapper::new(config, &Registry::new(), Box::new(|_| Ok(())));
        Mini {
            bootstrapper,
            manager,
            sender,
        }
    }

    #[test]
    fn test_unexpected_timeout() {
        let mut mini = mini(1);
        assert!(matches!(
            mini.bootstrapper.timeout(),
            Err(Error::UnexpectedTimeout)
        ));
        assert!(!mini.bootstrapper.awaiting_timeout());
    }

    #[test]
    fn test_fetch_with_no_beacons_fails() {
        let mut mini = mini(0);
        let missing = Id::from_bytes([5; 32]);
        assert!(matches!(
            mini.bootstrapper.force_accepted(vec![missing]),
            Err(Error::NoBeacons(id)) if id == missing
        ));
    }

    #[test]
    fn test_process_is_idempotent() {
        let mut mini = mini(1);

        // A's parent is registered but unknown locally, so processing A
        // cannot finish the round.
        let parent = MiniVertex::new(1, 1, Vec::new());
        let vtx = MiniVertex::new(2, 2, vec![parent.clone()]);
        mini.manager.register(&parent);
        mini.manager.register(&vtx);
        mini.manager.parse_vtx(&vtx.bytes).unwrap();

        let parsed = mini.manager.get_vtx(vtx.id).unwrap();
        mini.bootstrapper.process(vec![parsed.clone()]).unwrap();

        assert_eq!(mini.bootstrapper.vtx_blocked.len(), 1);
        assert_eq!(mini.bootstrapper.num_outstanding_requests(), 1);
        assert_eq!(
            mini.bootstrapper.vtx_blocked.missing_ids(),
            vec![parent.id]
        );
        let sent_before = mini.sender.sent.load(Ordering::SeqCst);

        // Processing the same set again leaves every structure unchanged.
        mini.bootstrapper.process(vec![parsed]).unwrap();
        assert_eq!(mini.bootstrapper.vtx_blocked.len(), 1);
        assert_eq!(mini.bootstrapper.num_outstanding_requests(), 1);
        assert_eq!(
            mini.bootstrapper.vtx_blocked.missing_ids(),
            vec![parent.id]
        );
        assert_eq!(mini.sender.sent.load(Ordering::SeqCst), sent_before);
    }

    #[test]
    fn test_rejected_vertex_is_fatal() {
        let mut mini = mini(1);

        let vtx = MiniVertex::new(3, 1, Vec::new());
        mini.manager.register(&vtx);
        mini.manager.parse_vtx(&vtx.bytes).unwrap();
        vtx.reject().unwrap();

        let parsed = mini.manager.get_vtx(vtx.id).unwrap();
        assert!(matches!(
            mini.bootstrapper.process(vec![parsed]),
            Err(Error::RejectedVertexReachable(id)) if id == vtx.id
        ));
    }

    #[test]
    fn test_outstanding_requests_capped() {
        let mut mini = mini(1);

        // Far more missing vertices than the outstanding limit.
        let accepted: Vec<Id> = (0..2 * MAX_OUTSTANDING_GET_ANCESTORS_REQUESTS)
            .map(|i| Id::from_hash(&[i as u8, (i >> 8) as u8]))
            .collect();
        mini.bootstrapper.force_accepted(accepted).unwrap();

        assert_eq!(
            mini.bootstrapper.num_outstanding_requests(),
            MAX_OUTSTANDING_GET_ANCESTORS_REQUESTS
        );
        assert_eq!(
            mini.sender.sent.load(Ordering::SeqCst),
            MAX_OUTSTANDING_GET_ANCESTORS_REQUESTS
        );
    }
}
