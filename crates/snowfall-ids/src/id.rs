//! 32-byte content-addressed identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::hashing::hash256;
use crate::ID_LEN;

/// A 32-byte identifier for vertices, transactions, chains, and subnets.
///
/// Ids are typically the SHA-256 hash of the entity's canonical bytes.
/// Equality is byte equality; ordering is lexicographic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Id([u8; ID_LEN]);

/// Errors that can occur when parsing an [`Id`].
#[derive(Debug, Error)]
pub enum IdError {
    /// The hex decoding failed.
    #[error("hex decoding failed: {0}")]
    Hex(#[from] hex::FromHexError),

    /// The decoded bytes have the wrong length.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

impl Id {
    /// The empty (all-zero) id.
    pub const EMPTY: Self = Self([0u8; ID_LEN]);

    /// Creates an id from a 32-byte array.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Creates an id from a slice.
    ///
    /// # Errors
    ///
    /// Returns `IdError::InvalidLength` if the slice is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdError> {
        if bytes.len() != ID_LEN {
            return Err(IdError::InvalidLength {
                expected: ID_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; ID_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Computes the id of the given content bytes (SHA-256).
    #[must_use]
    pub fn from_hash(bytes: &[u8]) -> Self {
        Self(hash256(bytes))
    }

    /// Returns the id as a byte array reference.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// Returns true if this is the empty (all-zero) id.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; ID_LEN]
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight leading bytes are plenty for log lines.
        write!(f, "Id({}…)", hex::encode(&self.0[..8]))
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8]> for Id {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; ID_LEN]> for Id {
    fn from(bytes: [u8; ID_LEN]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Id> for [u8; ID_LEN] {
    fn from(id: Id) -> Self {
        id.0
    }
}

impl Serialize for Id {
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

impl<'de> Deserialize<'de> for Id {
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
    fn test_empty() {
        assert!(Id::EMPTY.is_empty());
        assert!(!Id::from_bytes([1u8; 32]).is_empty());
    }

    #[test]
    fn test_from_slice() {
        let bytes = [42u8; 32];
        assert_eq!(Id::from_slice(&bytes).unwrap().as_bytes(), &bytes);
        assert!(Id::from_slice(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_from_hash() {
        let a = Id::from_hash(b"content");
        let b = Id::from_hash(b"content");
        let c = Id::from_hash(b"other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let lo = Id::from_bytes([0u8; 32]);
        let hi = Id::from_bytes([1u8; 32]);
        assert!(lo < hi);

        // A difference in the last byte only matters when every earlier
        // byte ties.
        let mut a = [0u8; 32];
        a[0] = 1;
        let mut b = a;
        b[31] = 1;
        assert!(Id::from_bytes(a) < Id::from_bytes(b));
    }

    #[test]
    fn test_parse_with_prefix() {
        let id = Id::from_bytes([0xab; 32]);
        let with_prefix = format!("0x{id}");
        assert_eq!(with_prefix.parse::<Id>().unwrap(), id);
    }

    #[test]
    fn test_json_roundtrip() {
        let id = Id::from_bytes([42u8; 32]);
        let json = serde_json::to_string(&id).unwrap();
        let parsed: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
