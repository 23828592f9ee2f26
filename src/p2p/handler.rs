//! Strategies for frames arriving on a peer socket.
//!
//! The server only observes inbound chains. What to do with a verified chain
//! (keep it, replace the local one, ignore it) is decided by a `ChainPolicy`
//! supplied by the ledger.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, warn};

use super::PeerId;
use crate::blockchain::{Block, BlockError, ChainSource, PowParams};
use crate::error::P2pError;

/// Hook invoked for every text frame received from a registered peer.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, peer: PeerId, text: &str);
}

/// Observe-only handler: logs the payload and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessages;

impl MessageHandler for LogMessages {
    fn on_message(&self, peer: PeerId, text: &str) {
        info!("peer {peer} data {text}");
    }
}

/// Decision point for a chain that passed per-block verification.
pub trait ChainPolicy: Send + Sync {
    fn consider(&self, peer: PeerId, chain: Vec<Block>);
}

/// Observe-only policy: compares a verified peer chain with the local one
/// and records the tallest chain seen. Never replaces anything.
pub struct ReportChains {
    local: Arc<dyn ChainSource>,
    tallest_seen: AtomicUsize,
}

impl ReportChains {
    pub fn new(local: Arc<dyn ChainSource>) -> Self {
        Self {
            local,
            tallest_seen: AtomicUsize::new(0),
        }
    }

    /// Height of the tallest verified chain any peer has sent.
    pub fn tallest_seen(&self) -> usize {
        self.tallest_seen.load(Ordering::Relaxed)
    }
}

impl ChainPolicy for ReportChains {
    fn consider(&self, peer: PeerId, chain: Vec<Block>) {
        let theirs = chain.len();
        let ours = self.local.height();
        self.tallest_seen.fetch_max(theirs, Ordering::Relaxed);
        if theirs > ours {
            info!("peer {peer} holds a longer chain ({theirs} > {ours} blocks)");
        } else {
            debug!("peer {peer} chain height {theirs}, local {ours}");
        }
    }
}

/// Parses a chain snapshot, checks its genesis and every block after it,
/// then hands it to `policy`. Rejected chains are logged and dropped.
pub struct VerifyingHandler<P> {
    genesis: Block,
    policy: P,
}

impl<P: ChainPolicy> VerifyingHandler<P> {
    pub fn new(params: &PowParams, policy: P) -> Self {
        Self {
            genesis: Block::genesis(params),
            policy,
        }
    }

    pub fn decode(&self, text: &str) -> Result<Vec<Block>, P2pError> {
        let chain: Vec<Block> = serde_json::from_str(text)?;
        let first = chain.first().ok_or(P2pError::EmptyChain)?;
        if *first != self.genesis {
            return Err(P2pError::InvalidBlock {
                index: 0,
                source: BlockError::UnknownGenesis {
                    hash: first.hash.clone(),
                },
            });
        }
        for (index, block) in chain.iter().enumerate().skip(1) {
            block
                .verify()
                .map_err(|source| P2pError::InvalidBlock { index, source })?;
        }
        Ok(chain)
    }
}

impl<P: ChainPolicy> MessageHandler for VerifyingHandler<P> {
    fn on_message(&self, peer: PeerId, text: &str) {
        match self.decode(text) {
            Ok(chain) => {
                debug!("peer {peer} sent verified chain of {} blocks", chain.len());
                self.policy.consider(peer, chain);
            }
            Err(e) => warn!("peer {peer} chain rejected: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Blockchain;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<(PeerId, usize)>>>);

    impl ChainPolicy for Recorder {
        fn consider(&self, peer: PeerId, chain: Vec<Block>) {
            self.0.lock().expect("mutex").push((peer, chain.len()));
        }
    }

    fn chain_json(bc: &Blockchain) -> String {
        serde_json::to_string(&bc.chain).expect("serialize")
    }

    #[test]
    fn verified_chain_reaches_policy() {
        let params = PowParams::default();
        let mut bc = Blockchain::new(params);
        bc.add_block(json!("a"));
        bc.add_block(json!("b"));

        let recorder = Recorder::default();
        let handler = VerifyingHandler::new(&params, recorder.clone());
        handler.on_message(7, &chain_json(&bc));
        assert_eq!(*recorder.0.lock().expect("mutex"), vec![(7, 3)]);
    }

    #[test]
    fn report_chains_tracks_tallest_verified_chain() {
        let params = PowParams::default();
        let local = Blockchain::shared(params);
        let mut remote = Blockchain::new(params);
        remote.add_block(json!("a"));
        remote.add_block(json!("b"));

        let handler = VerifyingHandler::new(&params, ReportChains::new(local.clone()));
        handler.on_message(1, &chain_json(&remote));
        handler.on_message(2, &serde_json::to_string(&local.snapshot()).expect("json"));
        assert_eq!(handler.policy.tallest_seen(), 3);

        // A forged chain never counts, however long.
        remote.add_block(json!("c"));
        remote.chain[3].data = json!("forged");
        handler.on_message(3, &chain_json(&remote));
        assert_eq!(handler.policy.tallest_seen(), 3);
        assert_eq!(local.height(), 1);
    }

    #[test]
    fn tampered_block_is_rejected_with_its_index() {
        let params = PowParams::default();
        let mut bc = Blockchain::new(params);
        bc.add_block(json!("a"));
        bc.chain[1].data = json!("forged");

        let recorder = Recorder::default();
        let handler = VerifyingHandler::new(&params, recorder.clone());
        let err = handler.decode(&chain_json(&bc)).expect_err("tampered");
        assert!(matches!(
            err,
            P2pError::InvalidBlock {
                index: 1,
                source: BlockError::HashMismatch { .. }
            }
        ));
        handler.on_message(1, &chain_json(&bc));
        assert!(recorder.0.lock().expect("mutex").is_empty());
    }

    #[test]
    fn foreign_genesis_is_rejected() {
        let ours = PowParams::default();
        let theirs = PowParams {
            difficulty: ours.difficulty + 1,
            ..ours
        };
        let handler = VerifyingHandler::new(&ours, Recorder::default());
        let err = handler
            .decode(&chain_json(&Blockchain::new(theirs)))
            .expect_err("foreign genesis");
        assert!(matches!(
            err,
            P2pError::InvalidBlock {
                index: 0,
                source: BlockError::UnknownGenesis { .. }
            }
        ));
    }

    #[test]
    fn malformed_and_empty_payloads_are_rejected() {
        let handler = VerifyingHandler::new(&PowParams::default(), Recorder::default());
        assert!(matches!(handler.decode("data 42"), Err(P2pError::Decode(_))));
        assert!(matches!(handler.decode("[]"), Err(P2pError::EmptyChain)));
    }
}
