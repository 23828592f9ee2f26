pub mod block;
pub mod model;

pub use block::{Block, PowParams, meets_difficulty};
pub use crate::error::BlockError;
pub use model::{Blockchain, ChainSource, SharedChain};

/// Default Proof-of-Work difficulty (number of leading hex zeros).
/// Difficulty is signed: retargeting has no floor, and anything <= 0 is always met.
pub const DEFAULT_DIFFICULTY: i32 = 3;

/// Target milliseconds between blocks, used to retarget difficulty.
pub const MINE_RATE_MS: i64 = 3000;

/// Fixed genesis values. The genesis hash is still computed over them.
pub const GENESIS_TIMESTAMP: i64 = 123_791_827_391_273;
pub const GENESIS_LAST_HASH: &str = "-----";

/// Hex characters in a SHA-256 digest.
pub const HASH_HEX_LEN: usize = 64;
