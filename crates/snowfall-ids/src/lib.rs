//! Identifier types for the snowfall network.
//!
//! - [`Id`]: a 32-byte content address for vertices, transactions, and chains
//! - [`NodeId`]: a 20-byte identifier for validator nodes
//!
//! Both types order lexicographically over their raw bytes and render as
//! hex strings.

mod hashing;
mod id;
mod node_id;

pub use hashing::{hash160, hash256, Hash160, Hash256};
pub use id::Id;
pub use node_id::NodeId;

/// Length of an [`Id`] in bytes.
pub const ID_LEN: usize = 32;

/// Length of a [`NodeId`] in bytes.
pub const NODE_ID_LEN: usize = 20;

/// Width of a request id on the wire.
pub type RequestId = u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_roundtrip() {
        let id = Id::from_bytes([7u8; ID_LEN]);
        let parsed: Id = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_node_id_display_roundtrip() {
        let id = NodeId::from_bytes([7u8; NODE_ID_LEN]);
        let parsed: NodeId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
