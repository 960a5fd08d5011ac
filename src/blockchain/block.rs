use chrono::Utc;
use serde::{Deserialize, Serialize, Serializer};
use utoipa::ToSchema;

use super::encoding::{BlockHash, CanonicalEncode};
use super::transaction::Transaction;

/// Represents a block in the blockchain
///
/// The position of a block in the chain is its index, so no index is stored.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
pub struct Block {
    /// Proof of work (nonce)
    nonce: u64,

    /// Hash of the previous block
    #[serde(rename = "previousHash")]
    #[schema(value_type = String, example = "000a5b1c...")]
    previous_hash: BlockHash,

    /// Creation time in nanoseconds since the Unix epoch. Informational only.
    timestamp: i64,

    /// List of transactions included in this block
    transactions: Vec<Transaction>,
}

/// The canonical view of a block, shared by hashing and serialization.
#[derive(Serialize)]
struct CanonicalBlock<'a> {
    nonce: u64,
    #[serde(rename = "previousHash")]
    previous_hash: &'a BlockHash,
    timestamp: i64,
    transactions: &'a [Transaction],
}

impl CanonicalEncode for CanonicalBlock<'_> {}

/// Computes the digest a proof of work is checked against
///
/// This is the hash of the block with its timestamp zeroed, so a proof stays
/// valid whenever the block is sealed.
pub fn proof_digest(nonce: u64, previous_hash: &BlockHash, transactions: &[Transaction]) -> BlockHash {
    CanonicalBlock {
        nonce,
        previous_hash,
        timestamp: 0,
        transactions,
    }
    .canonical_digest()
}

impl Block {
    /// Creates a new block stamped with the current time
    ///
    /// # Arguments
    ///
    /// * `nonce` - The proof of work (nonce)
    /// * `previous_hash` - The hash of the previous block
    /// * `transactions` - The list of transactions to include in the block
    pub fn new(nonce: u64, previous_hash: BlockHash, transactions: Vec<Transaction>) -> Self {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Block::with_timestamp(nonce, previous_hash, timestamp, transactions)
    }

    /// Creates a block with an explicit timestamp
    pub fn with_timestamp(
        nonce: u64,
        previous_hash: BlockHash,
        timestamp: i64,
        transactions: Vec<Transaction>,
    ) -> Self {
        Block {
            nonce,
            previous_hash,
            timestamp,
            transactions,
        }
    }

    /// The empty, zero-valued block whose hash seeds the genesis link
    pub fn zero() -> Self {
        Block::with_timestamp(0, BlockHash::ZERO, 0, Vec::new())
    }

    /// Calculates the hash of the block over its canonical encoding
    pub fn hash(&self) -> BlockHash {
        self.canonical().canonical_digest()
    }

    /// Calculates the digest the block's proof of work is checked against
    pub fn proof_hash(&self) -> BlockHash {
        proof_digest(self.nonce, &self.previous_hash, &self.transactions)
    }

    /// Returns the canonical encoding of the block
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical().canonical_bytes()
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn previous_hash(&self) -> &BlockHash {
        &self.previous_hash
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    fn canonical(&self) -> CanonicalBlock<'_> {
        CanonicalBlock {
            nonce: self.nonce,
            previous_hash: &self.previous_hash,
            timestamp: self.timestamp,
            transactions: &self.transactions,
        }
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.canonical().serialize(serializer)
    }
}
