use serde::{Deserialize, Serialize};

pub mod chain;
pub mod constants;
pub mod error;
pub mod mine;
pub mod shared;
pub mod signing;
pub mod validation;

pub use chain::{Chain, ChainConfig};
pub use error::{LedgerError, Violation};
pub use mine::{CancelToken, MiningBudget};
pub use shared::SharedChain;
pub use signing::{PrivateKey, PublicKey};

/// A signed value transfer.
///
/// A `Reward` has no source: the value is created by mining and credited to
/// the miner, who also signs it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transaction {
    Transfer {
        source: PublicKey,
        recipient: PublicKey,
        amount: i64,
        signature: String,
    },
    Reward {
        recipient: PublicKey,
        amount: i64,
        signature: String,
    },
}

impl Transaction {
    /// Sign a transaction with `key`. Without a recipient this issues a reward
    /// to the key's own public key.
    pub fn new(key: &PrivateKey, recipient: Option<&str>, amount: i64) -> Self {
        let public = signing::derive_public_key(key);
        match recipient {
            Some(recipient) => {
                let message = signed_message(Some(public.as_str()), recipient, amount);
                let signature = signing::sign(key, &message);
                Transaction::Transfer {
                    source: public,
                    recipient: recipient.to_string(),
                    amount,
                    signature,
                }
            }
            None => {
                let signature = signing::sign(key, &signed_message(None, &public, amount));
                Transaction::Reward {
                    recipient: public,
                    amount,
                    signature,
                }
            }
        }
    }

    pub fn transfer(key: &PrivateKey, recipient: &str, amount: i64) -> Self {
        Self::new(key, Some(recipient), amount)
    }

    pub fn reward(key: &PrivateKey, amount: i64) -> Self {
        Self::new(key, None, amount)
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            Transaction::Transfer { source, .. } => Some(source),
            Transaction::Reward { .. } => None,
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Transaction::Transfer { recipient, .. } | Transaction::Reward { recipient, .. } => {
                recipient
            }
        }
    }

    pub fn amount(&self) -> i64 {
        match self {
            Transaction::Transfer { amount, .. } | Transaction::Reward { amount, .. } => *amount,
        }
    }

    pub fn signature(&self) -> &str {
        match self {
            Transaction::Transfer { signature, .. } | Transaction::Reward { signature, .. } => {
                signature
            }
        }
    }

    pub fn is_reward(&self) -> bool {
        matches!(self, Transaction::Reward { .. })
    }

    /// Key the signature must verify against.
    pub fn signer(&self) -> &str {
        self.source().unwrap_or_else(|| self.recipient())
    }

    /// The exact bytes covered by the signature.
    pub fn message(&self) -> String {
        signed_message(self.source(), self.recipient(), self.amount())
    }
}

fn signed_message(source: Option<&str>, recipient: &str, amount: i64) -> String {
    format!("{}{}{}", source.unwrap_or_default(), recipient, amount)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub transactions: Vec<Transaction>,
    pub previous_hash: Option<String>,
    pub hash: String,
    pub nonce: Option<u64>,
}

impl Block {
    /// An unmined block on top of `previous_hash`.
    pub fn new(transactions: Vec<Transaction>, previous_hash: String) -> Self {
        Self {
            transactions,
            previous_hash: Some(previous_hash),
            hash: String::new(),
            nonce: None,
        }
    }

    pub fn genesis() -> Self {
        Self {
            transactions: vec![],
            previous_hash: None,
            hash: String::new(),
            nonce: None,
        }
    }

    pub fn is_mined(&self) -> bool {
        self.nonce.is_some()
    }

    /// Record the result of a nonce search.
    pub fn mined(self, nonce: u64, hash: String) -> Self {
        Self {
            nonce: Some(nonce),
            hash,
            ..self
        }
    }
}

/// Hex SHA-512 of `previous_hash ++ signatures ++ nonce`. Pure; `block.nonce`
/// and `block.hash` are ignored.
pub fn compute_hash(block: &Block, nonce: u64) -> String {
    hex::encode(pow::digest_with_nonce(&pow::prefix_hasher(block), nonce))
}

pub mod pow {
    use super::Block;
    use sha2::{Digest, Sha512};

    /// Hasher already fed with everything but the nonce.
    pub fn prefix_hasher(block: &Block) -> Sha512 {
        let mut hasher = Sha512::new();
        hasher.update(block.previous_hash.as_deref().unwrap_or_default());
        for tx in &block.transactions {
            hasher.update(tx.signature());
        }
        hasher
    }

    pub fn digest_with_nonce(prefix: &Sha512, nonce: u64) -> [u8; 64] {
        let mut hasher = prefix.clone();
        hasher.update(nonce.to_string());
        let digest = hasher.finalize();
        let mut out = [0u8; 64];
        out.copy_from_slice(&digest[..]);
        out
    }

    /// Number of leading zero hex digits in `digest`.
    pub fn count_leading_zero_nibbles(digest: &[u8]) -> u32 {
        let mut total = 0u32;
        for b in digest {
            if *b == 0 {
                total += 2;
            } else {
                if *b < 0x10 {
                    total += 1;
                }
                break;
            }
        }
        total
    }

    /// Whether a hex hash starts with `difficulty` `'0'` characters.
    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        let difficulty = difficulty as usize;
        hash.len() >= difficulty && hash.bytes().take(difficulty).all(|c| c == b'0')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HASH_HEX_SIZE;
    use sha2::{Digest, Sha512};

    fn key(seed: u8) -> PrivateKey {
        PrivateKey::from_bytes(&[seed; 32])
    }

    #[test]
    fn leading_zero_nibbles_examples() {
        let mut h = [0u8; 64];
        assert_eq!(pow::count_leading_zero_nibbles(&h), 128);
        h[0] = 0x0F;
        assert_eq!(pow::count_leading_zero_nibbles(&h), 1);
        h[0] = 0x10;
        assert_eq!(pow::count_leading_zero_nibbles(&h), 0);
        h = [0u8; 64];
        h[1] = 0x80;
        assert_eq!(pow::count_leading_zero_nibbles(&h), 2);
        h[1] = 0x08;
        assert_eq!(pow::count_leading_zero_nibbles(&h), 3);
    }

    #[test]
    fn nibbles_agree_with_hex_prefix() {
        let digest = [0x00, 0x03, 0xab];
        let hex = hex::encode(digest);
        assert!(pow::meets_difficulty(&hex, pow::count_leading_zero_nibbles(&digest)));
        assert!(!pow::meets_difficulty(&hex, 4));
    }

    #[test]
    fn meets_difficulty_examples() {
        assert!(pow::meets_difficulty("00ab", 2));
        assert!(pow::meets_difficulty("00ab", 0));
        assert!(!pow::meets_difficulty("0ab", 2));
        assert!(!pow::meets_difficulty("0", 2));
    }

    #[test]
    fn reward_transaction_has_no_source() {
        let miner = key(1);
        let tx = Transaction::reward(&miner, 100);
        assert!(tx.is_reward());
        assert_eq!(tx.source(), None);
        assert_eq!(tx.recipient(), signing::derive_public_key(&miner));
        assert_eq!(tx.signer(), tx.recipient());
        assert_eq!(tx.amount(), 100);
    }

    #[test]
    fn transfer_transaction_fields() {
        let alice = key(1);
        let bob = signing::derive_public_key(&key(2));
        let tx = Transaction::transfer(&alice, &bob, 30);
        assert!(!tx.is_reward());
        assert_eq!(tx.source(), Some(signing::derive_public_key(&alice).as_str()));
        assert_eq!(tx.recipient(), bob);
        assert_eq!(tx.signer(), tx.source().unwrap());
    }

    #[test]
    fn message_is_plain_concatenation() {
        let alice = key(1);
        let bob = signing::derive_public_key(&key(2));
        let tx = Transaction::transfer(&alice, &bob, 30);
        let expected = format!("{}{}30", signing::derive_public_key(&alice), bob);
        assert_eq!(tx.message(), expected);

        let reward = Transaction::reward(&alice, 100);
        assert_eq!(
            reward.message(),
            format!("{}100", signing::derive_public_key(&alice))
        );
    }

    #[test]
    fn signature_covers_message() {
        let tx = Transaction::transfer(&key(3), "deadbeef", 5);
        assert!(signing::verify(tx.signer(), &tx.message(), tx.signature()));
    }

    #[test]
    fn compute_hash_matches_manual_digest() {
        let tx = Transaction::reward(&key(1), 100);
        let block = Block::new(vec![tx.clone()], "abc".to_string());
        let manual = Sha512::digest(format!("abc{}7", tx.signature()));
        assert_eq!(compute_hash(&block, 7), hex::encode(manual));
        assert_eq!(compute_hash(&block, 7).len(), HASH_HEX_SIZE);
    }

    #[test]
    fn compute_hash_is_deterministic() {
        let block = Block::new(vec![Transaction::reward(&key(1), 100)], String::new());
        assert_eq!(compute_hash(&block, 42), compute_hash(&block, 42));
    }

    #[test]
    fn compute_hash_changes_with_nonce() {
        let block = Block::new(vec![Transaction::reward(&key(1), 100)], String::new());
        assert_ne!(compute_hash(&block, 0), compute_hash(&block, 1));
    }

    #[test]
    fn compute_hash_ignores_recorded_fields() {
        let block = Block::new(vec![], "prev".to_string());
        let before = compute_hash(&block, 3);
        let block = block.mined(9, "ffff".to_string());
        assert_eq!(compute_hash(&block, 3), before);
    }

    #[test]
    fn genesis_block_example() {
        let genesis = Block::genesis();
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis.previous_hash, None);
        assert!(genesis.hash.is_empty());
        assert!(!genesis.is_mined());
    }

    #[test]
    fn transaction_serialization_example() {
        let tx = Transaction::Reward {
            recipient: "ab".to_string(),
            amount: 100,
            signature: "cd".to_string(),
        };
        let json = serde_json::to_string(&tx).unwrap();
        let expected_json = r#"{"kind":"reward","recipient":"ab","amount":100,"signature":"cd"}"#;
        assert_eq!(json, expected_json);
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, deserialized);
    }

    #[test]
    fn block_serialization_example() {
        let block = Block::new(vec![Transaction::reward(&key(4), 100)], "00".to_string())
            .mined(12, "0f".to_string());
        let json = serde_json::to_string(&block).unwrap();
        let deserialized: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block, deserialized);
    }
}
