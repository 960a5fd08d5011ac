use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use std::mem;

use super::block::Block;
use super::crypto::{self, Address, CryptoError, DigitalSignature, PublicKey};
use super::encoding::BlockHash;
use super::pow::{valid_proof, ProofOfWork, SearchExhausted};
use super::transaction::Transaction;
use crate::config::{ConfigError, LedgerConfig};

/// Value of the reward paid for each sealed block
pub const MINING_REWARD: f32 = 1.0;

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Chain has no blocks")]
    EmptyChain,

    #[error("Mining failed: {0}")]
    SearchExhausted(#[from] SearchExhausted),

    #[error("A block is already being mined")]
    MiningInProgress,

    #[error("No block is being mined")]
    NoMiningInProgress,

    #[error("Invalid proof: nonce {0} does not satisfy the difficulty")]
    InvalidProof(u64),

    #[error("Invalid chain: {0}")]
    InvalidChain(String),

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Where the ledger is in the mining cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningState {
    Idle,
    Searching,
    Sealed,
}

/// The fixed input of one proof-of-work search
///
/// Created by [`Blockchain::begin_mining`], which moves the whole pending pool
/// (plus the reward) into the job. Transactions submitted afterwards land in
/// the next pool.
#[derive(Debug)]
pub struct MiningJob {
    previous_hash: BlockHash,
    transactions: Vec<Transaction>,
    proof_of_work: ProofOfWork,
}

impl MiningJob {
    /// Runs the nonce search over the snapshot
    pub fn search(&self) -> Result<u64, SearchExhausted> {
        self.proof_of_work.search(&self.previous_hash, &self.transactions)
    }

    pub fn previous_hash(&self) -> &BlockHash {
        &self.previous_hash
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }
}

/// Represents the blockchain
///
/// Owns the blocks and the pending pool. All methods take `&self`; share one
/// instance per process behind an `Arc`.
#[derive(Debug)]
pub struct Blockchain {
    /// The chain of blocks
    chain: Mutex<Vec<Block>>,

    /// Pending transactions to be included in the next block
    transaction_pool: Mutex<Vec<Transaction>>,

    mining_state: Mutex<MiningState>,

    /// Address the mining reward is paid to
    blockchain_address: Address,

    config: LedgerConfig,
}

impl Blockchain {
    /// Creates a new blockchain with a genesis block
    ///
    /// # Arguments
    ///
    /// * `blockchain_address` - The node's address, paid the mining rewards
    /// * `config` - Difficulty, reward and acceptance rules
    ///
    /// # Errors
    ///
    /// Rejects a config that fails [`LedgerConfig::validate`], such as a
    /// difficulty no digest can meet.
    pub fn new(
        blockchain_address: impl Into<Address>,
        config: LedgerConfig,
    ) -> Result<Self, BlockchainError> {
        config.validate()?;

        let blockchain = Blockchain {
            chain: Mutex::new(Vec::new()),
            transaction_pool: Mutex::new(Vec::new()),
            mining_state: Mutex::new(MiningState::Idle),
            blockchain_address: blockchain_address.into(),
            config,
        };

        let genesis = blockchain.seal_block(0, Block::zero().hash());
        info!("Created genesis block {}", genesis.hash());

        Ok(blockchain)
    }

    /// Creates a new blockchain with the default configuration
    pub fn with_defaults(blockchain_address: impl Into<Address>) -> Result<Self, BlockchainError> {
        Blockchain::new(blockchain_address, LedgerConfig::default())
    }

    pub fn blockchain_address(&self) -> &Address {
        &self.blockchain_address
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Adds a new transaction to the pending pool
    ///
    /// Values must be finite. Beyond that, rewards are accepted
    /// unconditionally. Anything else needs a signature
    /// over the transaction's digest that verifies under `sender_public_key`.
    /// Unless `bind_sender_to_key` is set, the key is not checked against the
    /// sender address.
    ///
    /// # Returns
    ///
    /// Whether the transaction was accepted
    pub fn add_transaction(
        &self,
        sender: impl Into<Address>,
        recipient: impl Into<Address>,
        value: f32,
        sender_public_key: Option<&PublicKey>,
        signature: Option<&DigitalSignature>,
    ) -> bool {
        let transaction = Transaction::new(sender, recipient, value);

        if !transaction.has_encodable_value() {
            warn!("Rejected transaction {}: value is not finite", transaction);
            return false;
        }

        if transaction.is_reward() {
            self.transaction_pool.lock().push(transaction);
            return true;
        }

        let (public_key, signature) = match (sender_public_key, signature) {
            (Some(public_key), Some(signature)) => (public_key, signature),
            _ => {
                warn!("Rejected unsigned transaction {}", transaction);
                return false;
            }
        };

        if self.config.bind_sender_to_key && &public_key.address() != transaction.sender() {
            warn!("Rejected transaction {}: key does not match sender", transaction);
            return false;
        }

        if !crypto::verify(public_key, signature, &transaction) {
            warn!("Could not verify transaction {}", transaction);
            return false;
        }

        if self.config.require_sufficient_funds {
            let balance = self.total_balance(transaction.sender());
            if balance < transaction.value() {
                warn!(
                    "Rejected transaction {}: balance {} is insufficient",
                    transaction, balance
                );
                return false;
            }
        }

        debug!("Accepted transaction {}", transaction);
        self.transaction_pool.lock().push(transaction);
        true
    }

    /// Returns an independent copy of the pending pool
    pub fn copy_pending_pool(&self) -> Vec<Transaction> {
        self.transaction_pool.lock().clone()
    }

    /// Seals the current pending pool into a new block
    ///
    /// The pool is emptied and the block appended under the same lock, so a
    /// concurrent submission lands either in this block or in the next pool.
    pub fn seal_block(&self, nonce: u64, previous_hash: BlockHash) -> Block {
        let mut pool = self.transaction_pool.lock();
        let block = Block::new(nonce, previous_hash, mem::take(&mut *pool));
        self.chain.lock().push(block.clone());
        block
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> Result<Block, BlockchainError> {
        self.chain.lock().last().cloned().ok_or(BlockchainError::EmptyChain)
    }

    /// Gets the entire blockchain
    pub fn chain(&self) -> Vec<Block> {
        self.chain.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.chain.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.lock().is_empty()
    }

    pub fn mining_state(&self) -> MiningState {
        *self.mining_state.lock()
    }

    /// Starts mining: Idle or Sealed to Searching
    ///
    /// Pays the reward into the pool, then moves the pool and the last block's
    /// hash into a [`MiningJob`]. The pool is left empty.
    pub fn begin_mining(&self) -> Result<MiningJob, BlockchainError> {
        let mut state = self.mining_state.lock();
        if *state == MiningState::Searching {
            return Err(BlockchainError::MiningInProgress);
        }

        let mut pool = self.transaction_pool.lock();
        let previous_hash = self.last_block()?.hash();

        pool.push(Transaction::reward(
            self.blockchain_address.clone(),
            self.config.mining_reward,
        ));
        let transactions = mem::take(&mut *pool);

        *state = MiningState::Searching;
        debug!(
            "Mining on top of {} with {} transactions",
            previous_hash,
            transactions.len()
        );

        Ok(MiningJob {
            previous_hash,
            transactions,
            proof_of_work: self.config.proof_of_work(),
        })
    }

    /// Seals a searched job: Searching to Sealed
    ///
    /// The block holds exactly the job's snapshot. If the proof does not check
    /// out, or the chain moved on since the job began, the job is aborted and
    /// its transactions go back to the pool.
    pub fn complete_mining(&self, job: MiningJob, nonce: u64) -> Result<Block, BlockchainError> {
        let mut state = self.mining_state.lock();
        if *state != MiningState::Searching {
            return Err(BlockchainError::NoMiningInProgress);
        }

        if !valid_proof(nonce, &job.previous_hash, &job.transactions, self.config.difficulty) {
            drop(state);
            self.abort_mining(job);
            return Err(BlockchainError::InvalidProof(nonce));
        }

        let mut chain = self.chain.lock();
        let tip = chain.last().map(Block::hash).ok_or(BlockchainError::EmptyChain)?;
        if tip != job.previous_hash {
            drop(chain);
            drop(state);
            self.abort_mining(job);
            return Err(BlockchainError::InvalidChain(
                "chain advanced while mining".to_string(),
            ));
        }

        let block = Block::new(nonce, job.previous_hash, job.transactions);
        chain.push(block.clone());
        *state = MiningState::Sealed;

        Ok(block)
    }

    /// Abandons a job: its transactions, minus the reward, go back to the
    /// front of the pool ahead of anything submitted since.
    pub fn abort_mining(&self, job: MiningJob) {
        let mut state = self.mining_state.lock();
        let mut restored = job.transactions;

        // begin_mining appends the reward last
        if restored.last().map_or(false, Transaction::is_reward) {
            restored.pop();
        }

        let mut pool = self.transaction_pool.lock();
        restored.append(&mut pool);
        *pool = restored;

        *state = MiningState::Idle;
        warn!("Mining aborted, {} transactions returned to the pool", pool.len());
    }

    /// Mines a new block with the pending transactions
    ///
    /// # Returns
    ///
    /// Result with the newly mined block
    pub fn mine(&self) -> Result<Block, BlockchainError> {
        let job = self.begin_mining()?;

        match job.search() {
            Ok(nonce) => {
                let block = self.complete_mining(job, nonce)?;
                info!("action=mining, status=success, nonce={}", nonce);
                Ok(block)
            }
            Err(err) => {
                self.abort_mining(job);
                Err(err.into())
            }
        }
    }

    /// Calculates the balance of an address by replaying every block
    pub fn total_balance(&self, address: &Address) -> f32 {
        let chain = self.chain.lock();
        let mut total = 0.0f32;

        for block in chain.iter() {
            for transaction in block.transactions() {
                if transaction.recipient() == address {
                    total += transaction.value();
                }
                if transaction.sender() == address {
                    total -= transaction.value();
                }
            }
        }

        total
    }

    /// Validates the blockchain
    ///
    /// # Returns
    ///
    /// true if every link and every proof checks out, false otherwise
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validates the blockchain, naming the first broken block
    pub fn validate(&self) -> Result<(), BlockchainError> {
        let chain = self.chain.lock();

        let genesis = chain.first().ok_or(BlockchainError::EmptyChain)?;
        if genesis.previous_hash() != &Block::zero().hash() {
            return Err(BlockchainError::InvalidChain(
                "genesis does not link to the zero block".to_string(),
            ));
        }

        for (index, pair) in chain.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);

            if current.previous_hash() != &previous.hash() {
                return Err(BlockchainError::InvalidChain(format!(
                    "block {} does not link to block {}",
                    index + 1,
                    index
                )));
            }

            if !valid_proof(
                current.nonce(),
                current.previous_hash(),
                current.transactions(),
                self.config.difficulty,
            ) {
                return Err(BlockchainError::InvalidChain(format!(
                    "block {} has an invalid proof",
                    index + 1
                )));
            }
        }

        Ok(())
    }
}
