use crate::{
    constants::{DEFAULT_DIFFICULTY, DEFAULT_REWARD, HASH_HEX_SIZE},
    error::{LedgerError, Violation},
    mine::{self, MiningBudget},
    validation, Block, PrivateKey, PublicKey, Transaction,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Mining policy of a chain. Fixed for the lifetime of the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Leading zero hex digits required of every mined block hash.
    pub difficulty: u32,
    /// Amount credited to the miner of each block.
    pub reward: i64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            reward: DEFAULT_REWARD,
        }
    }
}

impl ChainConfig {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.difficulty as usize > HASH_HEX_SIZE {
            return Err(LedgerError::InvalidConfig(format!(
                "difficulty {} exceeds hash length {}",
                self.difficulty, HASH_HEX_SIZE
            )));
        }
        if self.reward < 0 {
            return Err(LedgerError::InvalidConfig(format!(
                "reward {} is negative",
                self.reward
            )));
        }
        Ok(())
    }
}

/// An in-memory proof-of-work chain together with its pool of transactions
/// waiting to be mined.
///
/// Blocks only ever enter the chain through [`Chain::mine`]; the block list
/// always starts with the genesis block.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "ChainSnapshot")]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: u32,
    reward: i64,
    #[serde(rename = "pending_transactions")]
    pending: Vec<Transaction>,
}

#[derive(Deserialize)]
struct ChainSnapshot {
    blocks: Vec<Block>,
    difficulty: u32,
    reward: i64,
    #[serde(default)]
    pending_transactions: Vec<Transaction>,
}

impl TryFrom<ChainSnapshot> for Chain {
    type Error = LedgerError;

    fn try_from(snapshot: ChainSnapshot) -> Result<Self, Self::Error> {
        ChainConfig {
            difficulty: snapshot.difficulty,
            reward: snapshot.reward,
        }
        .validate()?;
        if snapshot.blocks.is_empty() {
            return Err(LedgerError::InvalidConfig(
                "chain snapshot has no genesis block".to_string(),
            ));
        }
        Ok(Self {
            blocks: snapshot.blocks,
            difficulty: snapshot.difficulty,
            reward: snapshot.reward,
            pending: snapshot.pending_transactions,
        })
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::with_valid_config(ChainConfig::default())
    }
}

impl Chain {
    pub fn new(config: ChainConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: ChainConfig) -> Self {
        Self {
            blocks: vec![Block::genesis()],
            difficulty: config.difficulty,
            reward: config.reward,
            pending: Vec::new(),
        }
    }

    pub fn config(&self) -> ChainConfig {
        ChainConfig {
            difficulty: self.difficulty,
            reward: self.reward,
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn reward(&self) -> i64 {
        self.reward
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Index of the last block; 0 when only genesis exists.
    pub fn height(&self) -> usize {
        self.blocks.len() - 1
    }

    pub fn head(&self) -> &Block {
        &self.blocks[self.height()]
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    #[cfg(test)]
    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }

    /// Queue a transaction for the next block. Nothing is checked here; bad
    /// transactions are caught when the chain is audited.
    pub fn submit_transaction(&mut self, tx: Transaction) {
        debug!(pending = self.pending.len() + 1, "transaction submitted");
        self.pending.push(tx);
    }

    /// Always fails: mining is the only way to extend the chain.
    pub fn add_block(&mut self, _block: Block) -> Result<(), LedgerError> {
        warn!("rejected direct block insertion");
        Err(LedgerError::DirectBlockInsertion)
    }

    /// Mine every pending transaction plus a reward for `miner` into a new
    /// block. Blocks the calling thread until a nonce is found.
    pub fn mine(&mut self, miner: &PrivateKey) -> Result<&Block, LedgerError> {
        self.mine_with(miner, &MiningBudget::unbounded())
    }

    pub fn mine_with(
        &mut self,
        miner: &PrivateKey,
        budget: &MiningBudget,
    ) -> Result<&Block, LedgerError> {
        let candidate = self.candidate(miner);
        let consumed = self.pending.len();
        let mined = mine::solve(candidate, self.difficulty, budget)?;
        self.commit(mined, consumed)
    }

    /// Unmined block holding a snapshot of the pool followed by the reward.
    pub(crate) fn candidate(&self, miner: &PrivateKey) -> Block {
        let mut transactions = self.pending.clone();
        transactions.push(Transaction::reward(miner, self.reward));
        debug!(
            transactions = transactions.len(),
            height = self.blocks.len(),
            "prepared candidate block"
        );
        Block::new(transactions, self.head().hash.clone())
    }

    /// Append a mined block and drop the first `consumed` pending
    /// transactions, which are the ones the block was built from.
    pub(crate) fn commit(&mut self, block: Block, consumed: usize) -> Result<&Block, LedgerError> {
        if block.previous_hash.as_deref() != Some(self.head().hash.as_str()) {
            warn!("discarding mined block built on a stale head");
            return Err(LedgerError::StaleTip);
        }
        self.pending.drain(..consumed.min(self.pending.len()));
        info!(
            height = self.blocks.len(),
            nonce = ?block.nonce,
            hash = %block.hash,
            "mined block"
        );
        self.blocks.push(block);
        Ok(self.head())
    }

    /// Full audit: linkage, block hashes, signatures, proof of work, rewards
    /// and balances.
    pub fn audit(&self) -> Result<(), Violation> {
        validation::audit(self)
    }

    pub fn is_valid(&self) -> bool {
        validation::is_fully_valid(self)
    }

    pub fn balances(&self) -> Result<BTreeMap<PublicKey, i64>, Violation> {
        validation::balances(self)
    }
}
