use thiserror::Error;

/// Failures of operations the ledger refuses to perform.
///
/// Malformed data never shows up here; the validators report it as a
/// [`Violation`] instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("blocks can only be added to the chain by mining")]
    DirectBlockInsertion,

    #[error("mining was cancelled")]
    MiningCancelled,

    #[error("no valid nonce found within {attempts} attempts")]
    NonceSpaceExhausted { attempts: u64 },

    #[error("chain head moved while the block was being mined")]
    StaleTip,

    #[error("invalid chain config: {0}")]
    InvalidConfig(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// The first rule a chain snapshot breaks, as found by an audit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("genesis block must have no previous hash and no transactions")]
    MalformedGenesis,

    #[error("block {height} does not link to its predecessor")]
    BrokenLink { height: usize },

    #[error("block {height} has not been mined")]
    Unmined { height: usize },

    #[error("block {height} hash does not match its contents")]
    HashMismatch { height: usize },

    #[error("block {height} contains an invalid transaction at position {position}")]
    InvalidTransaction { height: usize, position: usize },

    #[error("block {height} hash lacks {difficulty} leading zero digits")]
    InsufficientWork { height: usize, difficulty: u32 },

    #[error("block {height} contains {count} reward transactions")]
    MultipleRewards { height: usize, count: usize },

    #[error("block {height} rewards {amount}, expected {expected}")]
    WrongReward {
        height: usize,
        amount: i64,
        expected: i64,
    },

    #[error("account {account} overdrawn in block {height}")]
    NegativeBalance { height: usize, account: String },

    #[error("balance of account {account} overflows in block {height}")]
    BalanceOverflow { height: usize, account: String },
}
