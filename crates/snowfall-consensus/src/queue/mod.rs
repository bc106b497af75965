//! Durable, deduplicating queue of jobs awaiting execution.
//!
//! Jobs pushed here are persisted with their blocking edges so that a
//! restarted process resumes exactly where it stopped. Alongside the jobs
//! the queue records a set of *missing ids*: containers known to be
//! required but not yet fetched. Bootstrapping cannot finish while any
//! missing id remains.
//!
//! Key layout within the queue's database, one disjoint single-byte
//! prefix per record kind, lexicographically ordered for deterministic
//! iteration:
//!
//! | prefix | key            | value     |
//! |--------|----------------|-----------|
//! | `0x00` | job id         | job bytes |
//! | `0x01` | dep id, job id | (empty)   |
//! | `0x02` | missing id     | (empty)   |
//! | `0x03` | runnable id    | (empty)   |

mod jobs;

pub use jobs::{Job, JobMetrics, JobParser, TxJob, TxJobParser, VertexJob, VtxJobParser};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use snowfall_db::{Batch, Database};
use snowfall_ids::{Id, ID_LEN};
use tracing::{debug, info};

use crate::common::{Acceptor, STATUS_UPDATE_FREQUENCY};
use crate::context::Halter;
use crate::{Error, Result};

const JOB_PREFIX: u8 = 0x00;
const DEP_PREFIX: u8 = 0x01;
const MISSING_PREFIX: u8 = 0x02;
const RUNNABLE_PREFIX: u8 = 0x03;

fn job_key(id: &Id) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ID_LEN);
    key.push(JOB_PREFIX);
    key.extend_from_slice(id.as_bytes());
    key
}

fn dep_key(dep: &Id, job: &Id) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 2 * ID_LEN);
    key.push(DEP_PREFIX);
    key.extend_from_slice(dep.as_bytes());
    key.extend_from_slice(job.as_bytes());
    key
}

fn missing_key(id: &Id) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ID_LEN);
    key.push(MISSING_PREFIX);
    key.extend_from_slice(id.as_bytes());
    key
}

fn runnable_key(id: &Id) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ID_LEN);
    key.push(RUNNABLE_PREFIX);
    key.extend_from_slice(id.as_bytes());
    key
}

fn id_from_key(key: &[u8]) -> Result<Id> {
    Id::from_slice(key).map_err(|e| Error::CorruptQueueEntry(e.to_string()))
}

/// A persistent queue of jobs blocked on their dependencies.
pub struct Jobs {
    db: Arc<dyn Database>,
    batch: Box<dyn Batch>,
    parser: Option<Arc<dyn JobParser>>,

    /// Ids of every queued job.
    pending: HashSet<Id>,
    /// Jobs with no outstanding dependencies, in id order.
    runnable: BTreeSet<Id>,
    /// Dependency id to the jobs blocked on it.
    blocking: HashMap<Id, HashSet<Id>>,
    /// Job id to its outstanding dependencies.
    blocked_on: HashMap<Id, HashSet<Id>>,
    /// Containers required but not yet fetched.
    missing: BTreeSet<Id>,
}

impl Jobs {
    /// Opens the queue over `db`, reloading any persisted state.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be read or holds corrupt entries.
    pub fn new(db: Arc<dyn Database>) -> Result<Self> {
        let batch = db.new_batch();
        let mut jobs = Self {
            db,
            batch,
            parser: None,
            pending: HashSet::new(),
            runnable: BTreeSet::new(),
            blocking: HashMap::new(),
            blocked_on: HashMap::new(),
            missing: BTreeSet::new(),
        };
        jobs.reload()?;
        Ok(jobs)
    }

    fn reload(&mut self) -> Result<()> {
        let mut iter = self.db.iterator_with_prefix(&[JOB_PREFIX]);
        while iter.next() {
            self.pending.insert(id_from_key(&iter.key()[1..])?);
        }

        let mut iter = self.db.iterator_with_prefix(&[DEP_PREFIX]);
        while iter.next() {
            let key = &iter.key()[1..];
            if key.len() != 2 * ID_LEN {
                return Err(Error::CorruptQueueEntry(format!(
                    "dependency edge key has length {}",
                    key.len()
                )));
            }
            let dep = id_from_key(&key[..ID_LEN])?;
            let job = id_from_key(&key[ID_LEN..])?;
            self.blocking.entry(dep).or_default().insert(job);
            self.blocked_on.entry(job).or_default().insert(dep);
        }

        let mut iter = self.db.iterator_with_prefix(&[MISSING_PREFIX]);
        while iter.next() {
            self.missing.insert(id_from_key(&iter.key()[1..])?);
        }

        let mut iter = self.db.iterator_with_prefix(&[RUNNABLE_PREFIX]);
        while iter.next() {
            self.runnable.insert(id_from_key(&iter.key()[1..])?);
        }

        Ok(())
    }

    /// Injects the parser used to reconstruct jobs from their bytes.
    pub fn set_parser(&mut self, parser: Arc<dyn JobParser>) {
        self.parser = Some(parser);
    }

    /// Queues a job, returning false if a job with the same id is already
    /// queued.
    ///
    /// # Errors
    ///
    /// Fails if the job cannot report its dependencies.
    pub fn push(&mut self, job: &dyn Job) -> Result<bool> {
        let id = job.id();
        if !self.pending.insert(id) {
            return Ok(false);
        }

        self.batch.put(&job_key(&id), job.bytes());

        let deps = job.missing_dependencies()?;
        if deps.is_empty() {
            self.runnable.insert(id);
            self.batch.put(&runnable_key(&id), &[]);
        } else {
            for dep in deps {
                self.blocking.entry(dep).or_default().insert(id);
                self.blocked_on.entry(id).or_default().insert(dep);
                self.batch.put(&dep_key(&dep, &id), &[]);
            }
        }
        Ok(true)
    }

    /// Returns whether a job with this id is queued.
    pub fn has(&self, id: &Id) -> bool {
        self.pending.contains(id)
    }

    /// The number of queued jobs.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no jobs are queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Marks a container as required but not yet fetched.
    pub fn add_missing_id(&mut self, id: Id) {
        if self.missing.insert(id) {
            self.batch.put(&missing_key(&id), &[]);
        }
    }

    /// Clears a missing-container marker.
    pub fn remove_missing_id(&mut self, id: Id) {
        if self.missing.remove(&id) {
            self.batch.delete(&missing_key(&id));
        }
    }

    /// The missing-container markers, in id order.
    pub fn missing_ids(&self) -> Vec<Id> {
        self.missing.iter().copied().collect()
    }

    /// Flushes all buffered state changes to disk.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal for the bootstrap round.
    pub fn commit(&mut self) -> Result<()> {
        self.batch.write()?;
        Ok(())
    }

    /// Drops every queued job and missing-id marker, and commits the
    /// truncation.
    pub fn clear(&mut self) -> Result<()> {
        self.batch.reset();
        for prefix in [JOB_PREFIX, DEP_PREFIX, MISSING_PREFIX, RUNNABLE_PREFIX] {
            let mut iter = self.db.iterator_with_prefix(&[prefix]);
            while iter.next() {
                let key = iter.key().to_vec();
                self.batch.delete(&key);
            }
        }
        self.pending.clear();
        self.runnable.clear();
        self.blocking.clear();
        self.blocked_on.clear();
        self.missing.clear();
        self.commit()
    }

    /// Executes every runnable job, unblocking and executing dependents
    /// as their dependencies accept. Returns the number of jobs executed.
    ///
    /// Stops early without error when `halter` fires, returning before
    /// committing partial state.
    ///
    /// # Errors
    ///
    /// Propagates the first acceptor, execution, or persistence failure.
    pub fn execute_all(
        &mut self,
        halter: &Halter,
        restarted: bool,
        acceptors: &[&dyn Acceptor],
    ) -> Result<usize> {
        let parser = self.parser.clone().ok_or(Error::MissingParser)?;

        // Flush any buffered pushes so job bytes are readable below.
        self.commit()?;
        let mut count = 0usize;

        while let Some(id) = self.runnable.iter().next().copied() {
            if halter.halted() {
                return Ok(count);
            }

            let bytes = self
                .db
                .get(&job_key(&id))?
                .ok_or_else(|| Error::CorruptQueueEntry(format!("runnable job {id} has no bytes")))?;
            let job = parser.parse(&bytes)?;

            self.runnable.remove(&id);
            self.pending.remove(&id);
            self.batch.delete(&runnable_key(&id));
            self.batch.delete(&job_key(&id));

            for acceptor in acceptors {
                acceptor.accept(id, &bytes)?;
            }
            job.execute()?;

            if let Some(dependents) = self.blocking.remove(&id) {
                for dependent in dependents {
                    self.batch.delete(&dep_key(&id, &dependent));
                    let now_runnable = match self.blocked_on.get_mut(&dependent) {
                        Some(deps) => {
                            deps.remove(&id);
                            deps.is_empty()
                        }
                        None => true,
                    };
                    if now_runnable {
                        self.blocked_on.remove(&dependent);
                        self.runnable.insert(dependent);
                        self.batch.put(&runnable_key(&dependent), &[]);
                    }
                }
            }

            count += 1;
            if count as u64 % STATUS_UPDATE_FREQUENCY == 0 {
                if restarted {
                    debug!(executed = count, "executing operations");
                } else {
                    info!(executed = count, "executing operations");
                }
            }
        }

        self.commit()?;
        if restarted {
            debug!(executed = count, "executed operations");
        } else {
            info!(executed = count, "executed operations");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::RwLock;
    use snowfall_db::MemDb;

    /// A job whose bytes are just its id plus a dependency list.
    struct TestJob {
        id: Id,
        deps: Vec<Id>,
        bytes: Vec<u8>,
        executed: Arc<RwLock<Vec<Id>>>,
        accepted: Arc<RwLock<HashSet<Id>>>,
    }

    impl TestJob {
        fn encode(id: &Id, deps: &[Id]) -> Vec<u8> {
            let mut bytes = id.as_bytes().to_vec();
            for dep in deps {
                bytes.extend_from_slice(dep.as_bytes());
            }
            bytes
        }
    }

    impl Job for TestJob {
        fn id(&self) -> Id {
            self.id
        }

        fn missing_dependencies(&self) -> Result<Vec<Id>> {
            let accepted = self.accepted.read();
            Ok(self
                .deps
                .iter()
                .filter(|d| !accepted.contains(d))
                .copied()
                .collect())
        }

        fn execute(&self) -> Result<()> {
            self.executed.write().push(self.id);
            self.accepted.write().insert(self.id);
            Ok(())
        }

        fn bytes(&self) -> &[u8] {
            &self.bytes
        }
    }

    struct TestParser {
        executed: Arc<RwLock<Vec<Id>>>,
        accepted: Arc<RwLock<HashSet<Id>>>,
    }

    impl JobParser for TestParser {
        fn parse(&self, bytes: &[u8]) -> Result<Box<dyn Job>> {
            let id = Id::from_slice(&bytes[..ID_LEN]).unwrap();
            let deps = bytes[ID_LEN..]
                .chunks(ID_LEN)
                .map(|c| Id::from_slice(c).unwrap())
                .collect();
            Ok(Box::new(TestJob {
                id,
                deps,
                bytes: bytes.to_vec(),
                executed: self.executed.clone(),
                accepted: self.accepted.clone(),
            }))
        }
    }

    struct Harness {
        jobs: Jobs,
        executed: Arc<RwLock<Vec<Id>>>,
        accepted: Arc<RwLock<HashSet<Id>>>,
        db: Arc<MemDb>,
    }

    fn harness() -> Harness {
        let db = Arc::new(MemDb::new());
        let executed = Arc::new(RwLock::new(Vec::new()));
        let accepted = Arc::new(RwLock::new(HashSet::new()));
        let mut jobs = Jobs::new(db.clone()).unwrap();
        jobs.set_parser(Arc::new(TestParser {
            executed: executed.clone(),
            accepted: accepted.clone(),
        }));
        Harness {
            jobs,
            executed,
            accepted,
            db,
        }
    }

    fn id(byte: u8) -> Id {
        Id::from_bytes([byte; 32])
    }

    fn job(h: &Harness, byte: u8, deps: &[u8]) -> TestJob {
        let job_id = id(byte);
        let deps: Vec<Id> = deps.iter().map(|b| id(*b)).collect();
        TestJob {
            bytes: TestJob::encode(&job_id, &deps),
            id: job_id,
            deps,
            executed: h.executed.clone(),
            accepted: h.accepted.clone(),
        }
    }

    #[test]
    fn test_push_deduplicates() {
        let mut h = harness();
        assert!(h.jobs.push(&job(&h, 1, &[])).unwrap());
        assert!(!h.jobs.push(&job(&h, 1, &[])).unwrap());
        assert_eq!(h.jobs.len(), 1);
    }

    #[test]
    fn test_execute_all_respects_dependencies() {
        let mut h = harness();
        // 2 depends on 1, 3 depends on 2. Push children first, the way the
        // bootstrapper traverses.
        h.jobs.push(&job(&h, 3, &[2])).unwrap();
        h.jobs.push(&job(&h, 2, &[1])).unwrap();
        h.jobs.push(&job(&h, 1, &[])).unwrap();
        h.jobs.commit().unwrap();

        let halter = Halter::new();
        let executed = h.jobs.execute_all(&halter, false, &[]).unwrap();
        assert_eq!(executed, 3);
        assert_eq!(*h.executed.read(), vec![id(1), id(2), id(3)]);
        assert!(h.jobs.is_empty());
    }

    #[test]
    fn test_missing_ids_sorted_and_persistent() {
        let mut h = harness();
        h.jobs.add_missing_id(id(9));
        h.jobs.add_missing_id(id(3));
        h.jobs.add_missing_id(id(3));
        assert_eq!(h.jobs.missing_ids(), vec![id(3), id(9)]);

        h.jobs.remove_missing_id(id(9));
        h.jobs.commit().unwrap();

        // Reload from the same database.
        let reloaded = Jobs::new(h.db.clone()).unwrap();
        assert_eq!(reloaded.missing_ids(), vec![id(3)]);
    }

    #[test]
    fn test_restart_resumes_queue() {
        let mut h = harness();
        h.jobs.push(&job(&h, 2, &[1])).unwrap();
        h.jobs.push(&job(&h, 1, &[])).unwrap();
        h.jobs.commit().unwrap();

        // Rebuild the queue from disk, as after a process restart.
        let mut jobs = Jobs::new(h.db.clone()).unwrap();
        jobs.set_parser(Arc::new(TestParser {
            executed: h.executed.clone(),
            accepted: h.accepted.clone(),
        }));
        assert_eq!(jobs.len(), 2);

        let executed = jobs.execute_all(&Halter::new(), true, &[]).unwrap();
        assert_eq!(executed, 2);
        assert_eq!(*h.executed.read(), vec![id(1), id(2)]);
    }

    #[test]
    fn test_halt_stops_execution() {
        let mut h = harness();
        h.jobs.push(&job(&h, 1, &[])).unwrap();
        h.jobs.push(&job(&h, 2, &[])).unwrap();
        h.jobs.commit().unwrap();

        let halter = Halter::new();
        halter.halt();
        let executed = h.jobs.execute_all(&halter, false, &[]).unwrap();
        assert_eq!(executed, 0);
        assert_eq!(h.jobs.len(), 2);
    }

    #[test]
    fn test_acceptor_sees_bytes_before_execution() {
        struct Recording(RwLock<Vec<Id>>);
        impl Acceptor for Recording {
            fn accept(&self, id: Id, _bytes: &[u8]) -> Result<()> {
                self.0.write().push(id);
                Ok(())
            }
        }

        let mut h = harness();
        h.jobs.push(&job(&h, 1, &[])).unwrap();
        h.jobs.commit().unwrap();

        let recording = Recording(RwLock::new(Vec::new()));
        h.jobs
            .execute_all(&Halter::new(), false, &[&recording])
            .unwrap();
        assert_eq!(*recording.0.read(), vec![id(1)]);
    }

    #[test]
    fn test_clear_wipes_state_and_disk() {
        let mut h = harness();
        h.jobs.push(&job(&h, 1, &[])).unwrap();
        h.jobs.add_missing_id(id(5));
        h.jobs.commit().unwrap();

        h.jobs.clear().unwrap();
        assert!(h.jobs.is_empty());
        assert!(h.jobs.missing_ids().is_empty());

        let reloaded = Jobs::new(h.db.clone()).unwrap();
        assert!(reloaded.is_empty());
        assert!(reloaded.missing_ids().is_empty());
    }

    #[test]
    fn test_execute_without_parser_fails() {
        let db = Arc::new(MemDb::new());
        let mut jobs = Jobs::new(db).unwrap();
        assert!(matches!(
            jobs.execute_all(&Halter::new(), false, &[]),
            Err(Error::MissingParser)
        ));
    }
}
