//! Error types for the consensus core.

use snowfall_db::DatabaseError;
use snowfall_ids::{Id, NodeId};
use thiserror::Error;

/// Result type for consensus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the consensus core.
///
/// Handlers absorb the transient kinds (parse failures, unsolicited
/// messages) after logging; everything else unwinds to the driver.
#[derive(Debug, Error)]
pub enum Error {
    /// A timeout fired while none was registered. Indicates a logic bug
    /// in the driver, not a network condition.
    #[error("unexpected timeout fired")]
    UnexpectedTimeout,

    /// A previously rejected vertex reappeared as reachable from the
    /// accepted frontier.
    #[error("tried to accept {0} even though it was previously rejected")]
    RejectedVertexReachable(Id),

    /// The beacon set was empty when a fetch needed a peer to query.
    #[error("dropping request for {0}: no beacons available")]
    NoBeacons(Id),

    /// The beacon set was empty when sampling.
    #[error("cannot sample an empty beacon set")]
    EmptyBeaconSet,

    /// A beacon with the same node id is already registered.
    #[error("beacon {0} already in set")]
    DuplicateBeacon(NodeId),

    /// The (peer, request id) pair or the vertex already has an entry in
    /// the outstanding-requests table.
    #[error("duplicate outstanding request {request_id} to {peer}")]
    DuplicateRequest { peer: NodeId, request_id: u32 },

    /// Snowball parameters failed validation.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// A vertex or transaction failed to parse.
    #[error("parse failed: {0}")]
    Parse(String),

    /// A job was executed while its dependencies were still missing.
    #[error("attempting to execute job {0} with unmet dependencies")]
    DependenciesNotMet(Id),

    /// A job was executed with a status that cannot be accepted.
    #[error("attempting to execute job {id} with status {status}")]
    UnexpectedJobStatus { id: Id, status: String },

    /// The queue was asked to reconstruct a job before a parser was set.
    #[error("no job parser registered")]
    MissingParser,

    /// A persisted queue entry could not be reconstructed.
    #[error("corrupt queue entry: {0}")]
    CorruptQueueEntry(String),

    /// `Linearize` was invoked a second time on the same shim.
    #[error("chain already linearized")]
    AlreadyLinearized,

    /// The wrapped VM does not maintain a height index.
    #[error("height index not implemented by this VM")]
    HeightIndexNotImplemented,

    /// A database operation failed. Fatal for the current round.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// The VM returned an error.
    #[error("vm error: {0}")]
    Vm(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::UnexpectedTimeout;
        assert_eq!(err.to_string(), "unexpected timeout fired");

        let err = Error::NoBeacons(Id::EMPTY);
        assert!(err.to_string().contains("no beacons"));
    }

    #[test]
    fn test_database_conversion() {
        let err: Error = DatabaseError::Closed.into();
        assert!(matches!(err, Error::Database(DatabaseError::Closed)));
    }
}
