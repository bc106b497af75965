//! Validator node identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::hashing::{hash160, hash256};
use crate::NODE_ID_LEN;

/// The prefix used when rendering a [`NodeId`] as a string.
pub const NODE_ID_PREFIX: &str = "Node-";

/// A 20-byte identifier for a validator node.
///
/// Derived from the node's TLS certificate as
/// `RIPEMD160(SHA256(certificate_der))`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NodeId([u8; NODE_ID_LEN]);

/// Errors that can occur when parsing a [`NodeId`].
#[derive(Debug, Error)]
pub enum NodeIdError {
    /// The hex decoding failed.
    #[error("hex decoding failed: {0}")]
    Hex(#[from] hex::FromHexError),

    /// The decoded bytes have the wrong length.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The string is missing the `Node-` prefix.
    #[error("missing {NODE_ID_PREFIX} prefix")]
    MissingPrefix,
}

impl NodeId {
    /// The empty (all-zero) node id.
    pub const EMPTY: Self = Self([0u8; NODE_ID_LEN]);

    /// Creates a node id from a 20-byte array.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Creates a node id from a slice.
    ///
    /// # Errors
    ///
    /// Returns `NodeIdError::InvalidLength` if the slice is not exactly
    /// 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, NodeIdError> {
        if bytes.len() != NODE_ID_LEN {
            return Err(NodeIdError::InvalidLength {
                expected: NODE_ID_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; NODE_ID_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Derives a node id from a DER-encoded TLS certificate.
    #[must_use]
    pub fn from_cert(cert_der: &[u8]) -> Self {
        Self(hash160(&hash256(cert_der)))
    }

    /// Returns the node id as a byte array reference.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// Returns true if this is the empty (all-zero) node id.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; NODE_ID_LEN]
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{NODE_ID_PREFIX}{}", hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s
            .strip_prefix(NODE_ID_PREFIX)
            .ok_or(NodeIdError::MissingPrefix)?;
        let bytes = hex::decode(stripped)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; NODE_ID_LEN]> for NodeId {
    fn from(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl Serialize for NodeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            Self::from_slice(&bytes).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cert_deterministic() {
        let cert = b"certificate bytes";
        assert_eq!(NodeId::from_cert(cert), NodeId::from_cert(cert));
        assert_ne!(NodeId::from_cert(cert), NodeId::from_cert(b"other"));
    }

    #[test]
    fn test_display_has_prefix() {
        let id = NodeId::from_bytes([3u8; 20]);
        assert!(id.to_string().starts_with(NODE_ID_PREFIX));
    }

    #[test]
    fn test_parse_missing_prefix() {
        let err = "0303".parse::<NodeId>();
        assert!(matches!(err, Err(NodeIdError::MissingPrefix)));
    }

    #[test]
    fn test_from_slice_wrong_length() {
        assert!(NodeId::from_slice(&[0u8; 19]).is_err());
        assert!(NodeId::from_slice(&[0u8; 20]).is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let id = NodeId::from_bytes([42u8; 20]);
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.contains(NODE_ID_PREFIX));
        let parsed: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
