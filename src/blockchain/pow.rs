use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use super::block::proof_digest;
use super::encoding::{BlockHash, HASH_SIZE};
use super::transaction::Transaction;

/// Number of leading hex zeros a proof must produce
pub const MINING_DIFFICULTY: usize = 3;

/// Largest difficulty a 32-byte digest can satisfy
pub const MAX_DIFFICULTY: usize = HASH_SIZE * 2;

/// Returned when the nonce search hits its attempt cap
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("nonce search exhausted after {attempts} attempts")]
pub struct SearchExhausted {
    pub attempts: u64,
}

/// Checks whether a hash starts with `difficulty` hex zeros
pub fn meets_difficulty(hash: &BlockHash, difficulty: usize) -> bool {
    if difficulty > MAX_DIFFICULTY {
        return false;
    }

    (0..difficulty).all(|i| {
        let byte = hash.0[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        nibble == 0
    })
}

/// Checks a proof of work
///
/// Pure: the result depends only on the arguments, so anyone holding a block
/// can re-check it without chain state.
pub fn valid_proof(
    nonce: u64,
    previous_hash: &BlockHash,
    transactions: &[Transaction],
    difficulty: usize,
) -> bool {
    meets_difficulty(&proof_digest(nonce, previous_hash, transactions), difficulty)
}

/// Nonce search parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: usize,
    max_attempts: Option<u64>,
    workers: usize,
}

impl ProofOfWork {
    /// Creates an unbounded single-threaded search
    pub fn new(difficulty: usize) -> Self {
        ProofOfWork {
            difficulty,
            max_attempts: None,
            workers: 1,
        }
    }

    /// Caps the number of nonces tried. `None` searches forever.
    pub fn with_max_attempts(mut self, max_attempts: Option<u64>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Splits the search across `workers` threads
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Finds a nonce satisfying [`valid_proof`]
    ///
    /// With one worker nonces are tried in order from 0, so the smallest
    /// valid nonce wins. With several, worker `w` tries `w, w + n, w + 2n, ...`
    /// and the first to succeed stops the others.
    pub fn search(
        &self,
        previous_hash: &BlockHash,
        transactions: &[Transaction],
    ) -> Result<u64, SearchExhausted> {
        let limit = self.max_attempts.unwrap_or(u64::MAX);
        debug!(
            "searching for proof: difficulty={}, workers={}, limit={:?}",
            self.difficulty, self.workers, self.max_attempts
        );

        if self.workers == 1 {
            return (0..limit)
                .find(|&nonce| valid_proof(nonce, previous_hash, transactions, self.difficulty))
                .ok_or(SearchExhausted { attempts: limit });
        }

        self.search_parallel(previous_hash, transactions, limit)
    }

    fn search_parallel(
        &self,
        previous_hash: &BlockHash,
        transactions: &[Transaction],
        limit: u64,
    ) -> Result<u64, SearchExhausted> {
        let stride = self.workers as u64;
        let difficulty = self.difficulty;
        let found = AtomicBool::new(false);
        let winner: Mutex<Option<u64>> = Mutex::new(None);

        thread::scope(|scope| {
            for worker in 0..stride {
                let found = &found;
                let winner = &winner;

                scope.spawn(move || {
                    let mut nonce = worker;
                    while nonce < limit && !found.load(Ordering::Relaxed) {
                        if valid_proof(nonce, previous_hash, transactions, difficulty) {
                            let mut slot = winner.lock();
                            if slot.is_none() {
                                *slot = Some(nonce);
                            }
                            found.store(true, Ordering::Relaxed);
                            return;
                        }

                        nonce = match nonce.checked_add(stride) {
                            Some(next) => next,
                            None => return,
                        };
                    }
                });
            }
        });

        winner.into_inner().ok_or(SearchExhausted { attempts: limit })
    }
}

impl Default for ProofOfWork {
    fn default() -> Self {
        ProofOfWork::new(MINING_DIFFICULTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn random_transactions(rng: &mut impl Rng) -> Vec<Transaction> {
        let names = ["Rick", "Morty", "Summer", "Beth", "Jerry"];
        let count = rng.gen_range(0..6);

        (0..count)
            .map(|_| {
                let sender = names[rng.gen_range(0..names.len())];
                let recipient = names[rng.gen_range(0..names.len())];
                Transaction::new(sender, recipient, rng.gen_range(0.0f32..1000.0))
            })
            .collect()
    }

    #[test]
    fn test_valid_proof_matches_hex_prefix() {
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let transactions = random_transactions(&mut rng);
            let previous_hash = BlockHash(rng.gen());
            let nonce: u64 = rng.gen_range(0..10_000);
            let hex = proof_digest(nonce, &previous_hash, &transactions).to_hex();

            for difficulty in 0..=3 {
                let expected = hex.starts_with(&"0".repeat(difficulty));
                assert_eq!(
                    valid_proof(nonce, &previous_hash, &transactions, difficulty),
                    expected
                );
            }
        }
    }

    #[test]
    fn test_meets_difficulty_edges() {
        let mut bytes = [0xffu8; HASH_SIZE];
        bytes[0] = 0x00;
        bytes[1] = 0x0f;
        let hash = BlockHash(bytes);

        assert!(meets_difficulty(&hash, 0));
        assert!(meets_difficulty(&hash, 3));
        assert!(!meets_difficulty(&hash, 4));

        assert!(meets_difficulty(&BlockHash::ZERO, MAX_DIFFICULTY));
        assert!(!meets_difficulty(&BlockHash::ZERO, MAX_DIFFICULTY + 1));
    }

    #[test]
    fn test_difficulty_zero_accepts_any_nonce() {
        let transactions = vec![Transaction::new("Rick", "Morty", 1.0)];
        assert!(valid_proof(12345, &BlockHash::ZERO, &transactions, 0));
        assert_eq!(
            ProofOfWork::new(0).search(&BlockHash::ZERO, &transactions),
            Ok(0)
        );
    }

    #[test]
    fn test_search_finds_smallest_valid_nonce() {
        let transactions = vec![Transaction::reward("miner", 1.0)];
        let previous_hash = BlockHash::digest(b"genesis");

        let nonce = ProofOfWork::new(2).search(&previous_hash, &transactions).unwrap();

        assert!(valid_proof(nonce, &previous_hash, &transactions, 2));
        assert!((0..nonce).all(|n| !valid_proof(n, &previous_hash, &transactions, 2)));
    }

    #[test]
    fn test_parallel_search_finds_valid_nonce() {
        let transactions = vec![
            Transaction::reward("miner", 1.0),
            Transaction::new("Rick", "Morty", 127.0),
        ];
        let previous_hash = BlockHash::digest(b"parallel");

        let nonce = ProofOfWork::new(2)
            .with_workers(4)
            .search(&previous_hash, &transactions)
            .unwrap();

        assert!(valid_proof(nonce, &previous_hash, &transactions, 2));
    }

    #[test]
    fn test_search_terminates_quickly_at_low_difficulty() {
        // Expected attempts are 16^2 = 256; 100k failures is astronomically unlikely.
        let pow = ProofOfWork::new(2).with_max_attempts(Some(100_000));
        let mut rng = rand::thread_rng();

        for _ in 0..5 {
            let transactions = random_transactions(&mut rng);
            let previous_hash = BlockHash(rng.gen());
            let nonce = pow.search(&previous_hash, &transactions).unwrap();
            assert!(valid_proof(nonce, &previous_hash, &transactions, 2));
        }
    }

    #[test]
    fn test_search_reports_exhaustion() {
        let pow = ProofOfWork::new(MAX_DIFFICULTY).with_max_attempts(Some(500));
        assert_eq!(
            pow.search(&BlockHash::ZERO, &[]),
            Err(SearchExhausted { attempts: 500 })
        );

        let parallel = pow.with_workers(3);
        assert_eq!(
            parallel.search(&BlockHash::ZERO, &[]),
            Err(SearchExhausted { attempts: 500 })
        );
    }

    #[test]
    fn test_zero_workers_means_one() {
        let pow = ProofOfWork::new(1).with_workers(0);
        assert!(pow.search(&BlockHash::ZERO, &[]).is_ok());
    }
}
