use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};

use std::fmt;

/// Version of the canonical encoding shared by hashing, signing and the wire format.
///
/// Version 1 is compact JSON with fields in declaration order, digests as
/// lowercase hex and values rendered by `serde_json`'s float formatter.
/// Changing any of that invalidates every sealed chain and every signature.
pub const ENCODING_VERSION: u32 = 1;

/// Size in bytes of a block or transaction digest
pub const HASH_SIZE: usize = 32;

/// A SHA-256 content digest, rendered as hex on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockHash(pub [u8; HASH_SIZE]);

impl BlockHash {
    /// The all-zero digest
    pub const ZERO: BlockHash = BlockHash([0u8; HASH_SIZE]);

    /// Hashes raw bytes with SHA-256
    pub fn digest(bytes: &[u8]) -> Self {
        BlockHash(Sha256::digest(bytes).into())
    }

    /// Parses a 64-character hex string
    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; HASH_SIZE];
        hex::decode_to_slice(hex_str, &mut bytes)?;
        Ok(BlockHash(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        BlockHash::from_hex(&hex_str).map_err(de::Error::custom)
    }
}

/// Canonical byte encoding used for every digest in the ledger.
///
/// Implementors get their bytes from their `Serialize` impl, so whatever goes
/// over the wire is exactly what was hashed and signed.
pub trait CanonicalEncode: Serialize {
    /// Returns the canonical bytes of the value
    fn canonical_bytes(&self) -> Vec<u8> {
        // Only string-keyed structs reach here, which serde_json cannot fail on.
        serde_json::to_vec(self).expect("canonical encoding failed")
    }

    /// Returns the SHA-256 digest of the canonical bytes
    fn canonical_digest(&self) -> BlockHash {
        BlockHash::digest(&self.canonical_bytes())
    }
}
