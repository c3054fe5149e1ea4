//! Pure checks over transactions, blocks and whole chains.
//!
//! The `is_*` predicates never fail on malformed data, they just answer
//! `false`. The `check_*` functions report which rule was broken first.
//!
//! Two audits exist and a chain is only fully valid when both pass:
//! [`check_chain`] covers linkage, block hashes and signatures, while
//! [`check_mineable_chain`] covers proof of work, rewards and balances.

use crate::{
    compute_hash, error::Violation, pow::meets_difficulty, signing, Block, Chain, PublicKey,
    Transaction,
};
use std::collections::BTreeMap;
use tracing::warn;

/// Non-negative amount and a signature that verifies over the exact fields.
pub fn is_valid_transaction(tx: &Transaction) -> bool {
    tx.amount() >= 0 && signing::verify(tx.signer(), &tx.message(), tx.signature())
}

/// Recorded hash matches the recorded nonce and every transaction is valid.
/// Difficulty is a chain policy and is not looked at here.
pub fn is_valid_block(block: &Block) -> bool {
    check_block(block, 0).is_ok()
}

/// Block checks, reporting `height` in the violation.
pub fn check_block(block: &Block, height: usize) -> Result<(), Violation> {
    let nonce = block.nonce.ok_or(Violation::Unmined { height })?;
    if compute_hash(block, nonce) != block.hash {
        return Err(Violation::HashMismatch { height });
    }
    match block
        .transactions
        .iter()
        .position(|tx| !is_valid_transaction(tx))
    {
        Some(position) => Err(Violation::InvalidTransaction { height, position }),
        None => Ok(()),
    }
}

/// Genesis shape, previous-hash linkage and validity of every mined block.
pub fn check_chain(chain: &Chain) -> Result<(), Violation> {
    let blocks = chain.blocks();
    let Some((genesis, rest)) = blocks.split_first() else {
        return Err(Violation::MalformedGenesis);
    };
    if genesis.previous_hash.is_some() || !genesis.transactions.is_empty() {
        return Err(Violation::MalformedGenesis);
    }

    let mut previous = genesis;
    for (offset, block) in rest.iter().enumerate() {
        let height = offset + 1;
        if block.previous_hash.as_deref() != Some(previous.hash.as_str()) {
            return Err(Violation::BrokenLink { height });
        }
        check_block(block, height)?;
        previous = block;
    }
    Ok(())
}

pub fn is_valid_chain(chain: &Chain) -> bool {
    check_chain(chain).is_ok()
}

/// Proof of work on every block but genesis, then the economic replay.
pub fn check_mineable_chain(chain: &Chain) -> Result<(), Violation> {
    let difficulty = chain.difficulty();
    for (height, block) in chain.blocks().iter().enumerate().skip(1) {
        if !meets_difficulty(&block.hash, difficulty) {
            return Err(Violation::InsufficientWork { height, difficulty });
        }
    }
    replay(chain).map(|_| ())
}

pub fn is_valid_mineable_chain(chain: &Chain) -> bool {
    check_mineable_chain(chain).is_ok()
}

/// Both audits, linkage first.
pub fn audit(chain: &Chain) -> Result<(), Violation> {
    let verdict = check_chain(chain).and_then(|_| check_mineable_chain(chain));
    if let Err(violation) = &verdict {
        warn!(%violation, "chain audit failed");
    }
    verdict
}

pub fn is_fully_valid(chain: &Chain) -> bool {
    audit(chain).is_ok()
}

/// Final balance of every account that appears in the chain. Only the
/// reward and balance rules are enforced while replaying; signatures and
/// hashes are not.
pub fn balances(chain: &Chain) -> Result<BTreeMap<PublicKey, i64>, Violation> {
    replay(chain)
}

// Transactions are applied in strict order: a transfer may spend value
// credited earlier in the same block, never value credited later.
fn replay(chain: &Chain) -> Result<BTreeMap<PublicKey, i64>, Violation> {
    let mut balances: BTreeMap<PublicKey, i64> = BTreeMap::new();

    for (height, block) in chain.blocks().iter().enumerate() {
        let rewards: Vec<&Transaction> =
            block.transactions.iter().filter(|tx| tx.is_reward()).collect();
        if rewards.len() > 1 {
            return Err(Violation::MultipleRewards {
                height,
                count: rewards.len(),
            });
        }
        if let Some(reward) = rewards.first() {
            if reward.amount() != chain.reward() {
                return Err(Violation::WrongReward {
                    height,
                    amount: reward.amount(),
                    expected: chain.reward(),
                });
            }
        }

        for tx in &block.transactions {
            if let Some(source) = tx.source() {
                let balance = balances.entry(source.to_string()).or_insert(0);
                *balance = balance
                    .checked_sub(tx.amount())
                    .ok_or_else(|| Violation::BalanceOverflow {
                        height,
                        account: source.to_string(),
                    })?;
                if *balance < 0 {
                    return Err(Violation::NegativeBalance {
                        height,
                        account: source.to_string(),
                    });
                }
            }
            let balance = balances.entry(tx.recipient().to_string()).or_insert(0);
            *balance = balance
                .checked_add(tx.amount())
                .ok_or_else(|| Violation::BalanceOverflow {
                    height,
                    account: tx.recipient().to_string(),
                })?;
        }
    }
    Ok(balances)
}
