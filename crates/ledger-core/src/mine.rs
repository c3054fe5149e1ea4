use crate::{
    error::LedgerError,
    pow::{count_leading_zero_nibbles, digest_with_nonce, prefix_hasher},
    Block,
};
use rayon::prelude::*;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::debug;

/// Shared flag that aborts an in-flight nonce search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Limits on a single nonce search.
#[derive(Clone, Debug)]
pub struct MiningBudget {
    /// Nonces `0..max_attempts` are tried.
    pub max_attempts: u64,
    pub cancel: CancelToken,
}

impl Default for MiningBudget {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl MiningBudget {
    pub fn unbounded() -> Self {
        Self {
            max_attempts: u64::MAX,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_max_attempts(max_attempts: u64) -> Self {
        Self {
            max_attempts,
            ..Self::unbounded()
        }
    }

    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self {
            cancel,
            ..Self::unbounded()
        }
    }
}

/// Search nonces for `block` until its hash has `difficulty` leading zero hex
/// digits, and return the block with the winning nonce and hash recorded.
///
/// The range is split across rayon's pool but `find_first` still yields the
/// lowest satisfying nonce, so the result is the same as a linear scan from 0.
pub fn solve(block: Block, difficulty: u32, budget: &MiningBudget) -> Result<Block, LedgerError> {
    let prefix = prefix_hasher(&block);
    let cancel = &budget.cancel;

    let found = (0u64..budget.max_attempts)
        .into_par_iter()
        .find_first(|nonce| {
            cancel.is_cancelled()
                || count_leading_zero_nibbles(&digest_with_nonce(&prefix, *nonce)) >= difficulty
        });

    if cancel.is_cancelled() {
        debug!("nonce search cancelled");
        return Err(LedgerError::MiningCancelled);
    }
    let nonce = found.ok_or(LedgerError::NonceSpaceExhausted {
        attempts: budget.max_attempts,
    })?;
    let hash = hex::encode(digest_with_nonce(&prefix, nonce));
    debug!(nonce, %hash, "nonce search finished");
    Ok(block.mined(nonce, hash))
}
