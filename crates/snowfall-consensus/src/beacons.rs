//! Bootstrap beacon set.
//!
//! Beacons are the trusted peers a joining node queries while it has no
//! validated view of the network. The set preserves insertion order for
//! the CLI flag renderings and deduplicates on node id.

use std::collections::HashSet;
use std::net::SocketAddr;

use rand::Rng;
use snowfall_ids::NodeId;

use crate::{Error, Result};

/// A single bootstrap beacon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    node_id: NodeId,
    addr: SocketAddr,
}

impl Beacon {
    /// Creates a new beacon.
    pub fn new(node_id: NodeId, addr: SocketAddr) -> Self {
        Self { node_id, addr }
    }

    /// The beacon's node id.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The beacon's network address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// An ordered, deduplicating set of bootstrap beacons.
#[derive(Debug, Default)]
pub struct BeaconSet {
    beacons: Vec<Beacon>,
    ids: HashSet<NodeId>,
}

impl BeaconSet {
    /// Creates an empty beacon set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a beacon.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateBeacon` if a beacon with the same node id
    /// is already registered.
    pub fn add(&mut self, beacon: Beacon) -> Result<()> {
        if !self.ids.insert(beacon.node_id) {
            return Err(Error::DuplicateBeacon(beacon.node_id));
        }
        self.beacons.push(beacon);
        Ok(())
    }

    /// Removes the beacon with the given node id, returning whether one
    /// was present.
    ///
    /// The last beacon is swapped into the vacated slot, so survivors are
    /// reordered.
    pub fn remove_by_id(&mut self, node_id: NodeId) -> bool {
        if !self.ids.remove(&node_id) {
            return false;
        }
        if let Some(index) = self.beacons.iter().position(|b| b.node_id == node_id) {
            self.beacons.swap_remove(index);
        }
        true
    }

    /// Returns the number of registered beacons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    /// Returns true if no beacons are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }

    /// Samples `k` beacon node ids uniformly, with replacement.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyBeaconSet` if no beacons are registered.
    pub fn sample(&self, k: usize) -> Result<Vec<NodeId>> {
        if self.beacons.is_empty() {
            return Err(Error::EmptyBeaconSet);
        }
        let mut rng = rand::thread_rng();
        Ok((0..k)
            .map(|_| self.beacons[rng.gen_range(0..self.beacons.len())].node_id)
            .collect())
    }

    /// Renders the node ids as a comma-joined CLI argument.
    pub fn ids_arg(&self) -> String {
        self.beacons
            .iter()
            .map(|b| b.node_id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Renders the addresses as a comma-joined CLI argument.
    pub fn ips_arg(&self) -> String {
        self.beacons
            .iter()
            .map(|b| b.addr.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon(byte: u8, port: u16) -> Beacon {
        Beacon::new(
            NodeId::from_bytes([byte; 20]),
            format!("0.0.0.0:{port}").parse().unwrap(),
        )
    }

    #[test]
    fn test_add_and_remove() {
        let mut set = BeaconSet::new();
        assert_eq!(set.len(), 0);
        assert_eq!(set.ids_arg(), "");
        assert_eq!(set.ips_arg(), "");

        set.add(beacon(0, 0)).unwrap();
        set.add(beacon(1, 1)).unwrap();
        assert_eq!(set.len(), 2);

        assert!(set.remove_by_id(NodeId::from_bytes([0; 20])));
        assert!(!set.remove_by_id(NodeId::from_bytes([0; 20])));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove_swaps_last_into_place() {
        let mut set = BeaconSet::new();
        set.add(beacon(0, 0)).unwrap();
        set.add(beacon(1, 1)).unwrap();
        set.add(beacon(2, 2)).unwrap();
        assert_eq!(set.ips_arg(), "0.0.0.0:0,0.0.0.0:1,0.0.0.0:2");

        // Removing the first beacon moves the last one into its slot.
        assert!(set.remove_by_id(NodeId::from_bytes([0; 20])));
        assert_eq!(set.ips_arg(), "0.0.0.0:2,0.0.0.0:1");

        assert!(set.remove_by_id(NodeId::from_bytes([1; 20])));
        assert_eq!(set.ips_arg(), "0.0.0.0:2");
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut set = BeaconSet::new();
        set.add(beacon(0, 0)).unwrap();
        let err = set.add(beacon(0, 9));
        assert!(matches!(err, Err(Error::DuplicateBeacon(_))));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_args_preserve_insertion_order() {
        let mut set = BeaconSet::new();
        set.add(beacon(0, 10)).unwrap();
        set.add(beacon(1, 11)).unwrap();

        let ids = set.ids_arg();
        let ips = set.ips_arg();
        assert_eq!(ids.split(',').count(), 2);
        assert_eq!(ips, "0.0.0.0:10,0.0.0.0:11");
    }

    #[test]
    fn test_sample_with_replacement() {
        let mut set = BeaconSet::new();
        set.add(beacon(0, 0)).unwrap();

        // A single beacon sampled many times must keep returning it;
        // repeats are allowed by construction.
        let sampled = set.sample(5).unwrap();
        assert_eq!(sampled.len(), 5);
        assert!(sampled.iter().all(|id| *id == NodeId::from_bytes([0; 20])));
    }

    #[test]
    fn test_sample_empty_errors() {
        let set = BeaconSet::new();
        assert!(matches!(set.sample(1), Err(Error::EmptyBeaconSet)));
    }
}
