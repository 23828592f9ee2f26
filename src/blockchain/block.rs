use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{DEFAULT_DIFFICULTY, GENESIS_LAST_HASH, GENESIS_TIMESTAMP, HASH_HEX_LEN, MINE_RATE_MS};
use crate::error::BlockError;

/// Process-wide Proof-of-Work parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowParams {
    /// Genesis difficulty and retarget baseline.
    pub difficulty: i32,
    /// Target interval between blocks, in milliseconds.
    pub mine_rate_ms: i64,
}

impl Default for PowParams {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mine_rate_ms: MINE_RATE_MS,
        }
    }
}

/// One link in the chain. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub timestamp: i64, // epoch millis (UTC)
    pub last_hash: String,
    pub hash: String,
    pub data: Value,
    pub nonce: u64,
    pub difficulty: i32,
}

impl Block {
    /// The fixed, parentless first block. Its hash is computed like any other.
    pub fn genesis(params: &PowParams) -> Self {
        let data = Value::Array(Vec::new());
        let hash = Self::hash_fields(
            GENESIS_TIMESTAMP,
            GENESIS_LAST_HASH,
            &data,
            0,
            params.difficulty,
        );
        Self {
            timestamp: GENESIS_TIMESTAMP,
            last_hash: GENESIS_LAST_HASH.to_string(),
            hash,
            data,
            nonce: 0,
            difficulty: params.difficulty,
        }
    }

    /// SHA-256 (hex) over `timestamp ‖ last_hash ‖ data ‖ nonce ‖ difficulty`.
    ///
    /// `data` is stringified as compact JSON, so strings hash quoted and an
    /// empty array hashes as `[]`. Digests are therefore not interchangeable
    /// with nodes that stringify payloads differently (e.g. the JS node).
    pub fn hash_fields(
        timestamp: i64,
        last_hash: &str,
        data: &Value,
        nonce: u64,
        difficulty: i32,
    ) -> String {
        digest(timestamp, last_hash, &data.to_string(), nonce, difficulty)
    }

    /// Recompute the hash of this block from its own fields.
    pub fn compute_hash(&self) -> String {
        Self::hash_fields(
            self.timestamp,
            &self.last_hash,
            &self.data,
            self.nonce,
            self.difficulty,
        )
    }

    /// Retarget rule: one step harder when `current_time` is within
    /// `mine_rate_ms` of `last`, one step easier otherwise. No floor: the
    /// result may reach 0 or go negative, which every hash satisfies.
    pub fn adjust_difficulty(last: &Block, current_time: i64, mine_rate_ms: i64) -> i32 {
        if last.timestamp.saturating_add(mine_rate_ms) > current_time {
            last.difficulty.saturating_add(1)
        } else {
            last.difficulty.saturating_sub(1)
        }
    }

    /// Proof-of-Work search on top of `last`. Unbounded and CPU-bound;
    /// run it off any I/O thread.
    pub fn mine(last: &Block, data: Value, params: &PowParams) -> Self {
        let never = AtomicBool::new(false);
        Self::mine_with_cancel(last, data, params, &never)
            .unwrap_or_else(|| unreachable!("cancel flag is never raised"))
    }

    /// Same search as [`Block::mine`], but checks `cancel` once per nonce and
    /// returns `None` as soon as it is raised.
    pub fn mine_with_cancel(
        last: &Block,
        data: Value,
        params: &PowParams,
        cancel: &AtomicBool,
    ) -> Option<Self> {
        let data_str = data.to_string();
        let mut nonce: u64 = 0;

        loop {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            nonce = nonce.wrapping_add(1);
            let timestamp = Utc::now().timestamp_millis();
            // Recomputed every attempt: the timestamp moves.
            let difficulty = Self::adjust_difficulty(last, timestamp, params.mine_rate_ms);
            let hash = digest(timestamp, &last.hash, &data_str, nonce, difficulty);

            if meets_difficulty(&hash, difficulty) {
                return Some(Self {
                    timestamp,
                    last_hash: last.hash.clone(),
                    hash,
                    data,
                    nonce,
                    difficulty,
                });
            }
        }
    }

    /// Check the stored hash and the leading-zero predicate.
    /// (Does NOT check linkage to a predecessor.)
    pub fn verify(&self) -> Result<(), BlockError> {
        let computed = self.compute_hash();
        if self.hash != computed {
            return Err(BlockError::HashMismatch {
                stored: self.hash.clone(),
                computed,
            });
        }
        if !meets_difficulty(&self.hash, self.difficulty) {
            return Err(BlockError::InsufficientWork {
                hash: self.hash.clone(),
                difficulty: self.difficulty,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.verify().is_ok()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block(ts={} last={} hash={} nonce={} diff={} data={})",
            self.timestamp,
            short(&self.last_hash),
            short(&self.hash),
            self.nonce,
            self.difficulty,
            self.data
        )
    }
}

/// True when the first `difficulty` hex chars of `hash` are all `'0'`.
/// Zero or negative difficulty is always met; a difficulty wider than a
/// SHA-256 digest never is.
pub fn meets_difficulty(hash: &str, difficulty: i32) -> bool {
    let Ok(d) = usize::try_from(difficulty) else {
        return true;
    };
    if d > HASH_HEX_LEN || hash.len() < d {
        return false;
    }
    hash.bytes().take(d).all(|b| b == b'0')
}

fn digest(timestamp: i64, last_hash: &str, data: &str, nonce: u64, difficulty: i32) -> String {
    let preimage = format!("{timestamp}{last_hash}{data}{nonce}{difficulty}");
    let mut hasher = Sha256::new();
    hasher.update(preimage.as_bytes());
    hex::encode(hasher.finalize())
}

fn short(hash: &str) -> &str {
    hash.get(..10).unwrap_or(hash)
}
