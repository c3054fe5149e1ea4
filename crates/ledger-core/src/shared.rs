use crate::{
    error::LedgerError,
    mine::{self, MiningBudget},
    Block, Chain, PrivateKey, Transaction,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// A [`Chain`] that can be submitted to and mined from several threads.
///
/// The nonce search runs without holding the lock. Only taking the candidate
/// snapshot and committing the mined block are serialized, and the commit
/// appends the block and drops the mined transactions from the pool in one
/// critical section.
#[derive(Clone, Default)]
pub struct SharedChain {
    inner: Arc<Mutex<Chain>>,
}

impl SharedChain {
    pub fn new(chain: Chain) -> Self {
        Self {
            inner: Arc::new(Mutex::new(chain)),
        }
    }

    pub fn submit_transaction(&self, tx: Transaction) {
        self.inner.lock().submit_transaction(tx);
    }

    /// Consistent copy of the current state.
    pub fn snapshot(&self) -> Chain {
        self.inner.lock().clone()
    }

    pub fn mine(&self, miner: &PrivateKey) -> Result<Block, LedgerError> {
        self.mine_with(miner, &MiningBudget::unbounded())
    }

    /// Fails with [`LedgerError::StaleTip`] if another block was committed
    /// while this one was being searched for; the pool is left as it was.
    pub fn mine_with(&self, miner: &PrivateKey, budget: &MiningBudget) -> Result<Block, LedgerError> {
        let (candidate, consumed, difficulty) = {
            let chain = self.inner.lock();
            (chain.candidate(miner), chain.pending().len(), chain.difficulty())
        };
        debug!(consumed, "searching nonce outside the chain lock");
        let mined = mine::solve(candidate, difficulty, budget)?;
        let mut chain = self.inner.lock();
        let block = chain.commit(mined, consumed)?.clone();
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mine::CancelToken, signing::derive_public_key, ChainConfig};

    fn shared() -> SharedChain {
        SharedChain::new(
            Chain::new(ChainConfig {
                difficulty: 1,
                reward: 100,
            })
            .unwrap(),
        )
    }

    #[test]
    fn mine_commits_and_clears_pool() {
        let chain = shared();
        let key = PrivateKey::from_bytes(&[1u8; 32]);
        chain.submit_transaction(Transaction::transfer(&key, "a", 0));
        let block = chain.mine(&key).unwrap();
        let snapshot = chain.snapshot();
        assert_eq!(snapshot.head(), &block);
        assert!(snapshot.pending().is_empty());
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[1].recipient(), derive_public_key(&key));
    }

    #[test]
    fn cancelled_mining_leaves_state_alone() {
        let chain = shared();
        let key = PrivateKey::from_bytes(&[1u8; 32]);
        chain.submit_transaction(Transaction::transfer(&key, "a", 0));
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = chain
            .mine_with(&key, &MiningBudget::with_cancel(cancel))
            .unwrap_err();
        assert_eq!(err, LedgerError::MiningCancelled);
        let snapshot = chain.snapshot();
        assert_eq!(snapshot.height(), 0);
        assert_eq!(snapshot.pending().len(), 1);
    }

    #[test]
    fn clones_share_state() {
        let chain = shared();
        let other = chain.clone();
        let key = PrivateKey::from_bytes(&[1u8; 32]);
        other.mine(&key).unwrap();
        assert_eq!(chain.snapshot().height(), 1);
    }
}
