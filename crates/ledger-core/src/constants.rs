pub const HASH_SIZE: usize = 64;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const PUBLIC_KEY_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;
pub const DEFAULT_DIFFICULTY: u32 = 2;
pub const DEFAULT_REWARD: i64 = 100;
