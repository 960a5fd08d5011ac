// Blockchain module
//
// This module contains the core ledger implementation including:
// - Canonical encoding and digests
// - Block structure
// - Blockchain structure, pending pool and mining
// - Transaction structure
// - Wallets, addresses and signatures
// - Proof of work algorithm

pub mod block;
pub mod chain;
pub mod crypto;
pub mod encoding;
pub mod pow;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Blockchain, BlockchainError, MiningJob, MiningState, MINING_REWARD};
pub use crypto::{Address, DigitalSignature, PrivateKey, PublicKey, Wallet};
pub use encoding::{BlockHash, CanonicalEncode, ENCODING_VERSION};
pub use pow::{valid_proof, ProofOfWork, MINING_DIFFICULTY};
pub use transaction::{Transaction, MINING_SENDER};
