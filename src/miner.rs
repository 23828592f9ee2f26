//! Mining task boundary.
//!
//! Runs the Proof-of-Work search on tokio's blocking pool so it never stalls
//! peer I/O. Every round gets its own cancel flag, polled once per nonce;
//! `cancel()` raises the flags of the rounds in flight and nothing else.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use serde_json::Value;

use crate::blockchain::{Block, SharedChain};

/// How a mining round ended.
#[derive(Debug, Clone, PartialEq)]
pub enum MiningOutcome {
    /// Block was mined and appended to the chain.
    Mined(Block),
    /// Block was mined but the tip moved meanwhile; it was discarded.
    Stale(Block),
    /// `cancel()` was called before a solution was found.
    Cancelled,
}

#[derive(Debug, Default)]
pub struct MiningHandle {
    next_round: AtomicU64,
    in_flight: Mutex<HashMap<u64, Arc<AtomicBool>>>,
}

impl MiningHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop every search currently running (e.g. a competing block superseded
    /// them). Rounds started afterwards are unaffected. Returns how many
    /// rounds were signalled.
    pub fn cancel(&self) -> usize {
        let rounds = self.in_flight.lock().expect("mutex poisoned");
        for flag in rounds.values() {
            flag.store(true, Ordering::SeqCst);
        }
        rounds.len()
    }

    /// Mine one block on top of the current tip of `chain`.
    ///
    /// The chain lock is held only to snapshot the tip and to append.
    pub async fn mine_next(&self, chain: SharedChain, data: Value) -> MiningOutcome {
        let (tip, params) = {
            let bc = chain.lock().expect("mutex poisoned");
            (bc.last_block().clone(), *bc.params())
        };
        debug!("MINER - starting on tip {}", tip);

        let round = self.next_round.fetch_add(1, Ordering::Relaxed);
        let flag = Arc::new(AtomicBool::new(false));
        self.in_flight
            .lock()
            .expect("mutex poisoned")
            .insert(round, flag.clone());

        let search = tokio::task::spawn_blocking(move || {
            Block::mine_with_cancel(&tip, data, &params, &flag)
        });
        let searched = search.await;
        self.in_flight
            .lock()
            .expect("mutex poisoned")
            .remove(&round);

        let block = match searched {
            Ok(Some(block)) => block,
            Ok(None) => {
                info!("MINER - round {round} cancelled");
                return MiningOutcome::Cancelled;
            }
            Err(e) => {
                warn!("MINER - search task failed: {e}");
                return MiningOutcome::Cancelled;
            }
        };

        let mut bc = chain.lock().expect("mutex poisoned");
        let appended = bc.append(block.clone()).map(|_| ());
        match appended {
            Ok(()) => {
                info!(
                    "MINER - sealed block #{} (hash={}, nonce={}, diff={})",
                    bc.len() - 1,
                    block.hash,
                    block.nonce,
                    block.difficulty
                );
                MiningOutcome::Mined(block)
            }
            Err(e) => {
                warn!("MINER - discarding mined block: {e}");
                MiningOutcome::Stale(block)
            }
        }
    }
}
