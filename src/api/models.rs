use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blockchain::{Block, SharedChain};
use crate::miner::MiningHandle;
use crate::p2p::{PeerInfo, PeerRegistry};

/// Shared application state: the ledger, the miner and the live peer set.
pub struct AppState {
    pub blockchain: SharedChain,
    pub miner: MiningHandle,
    pub peers: Arc<PeerRegistry>,
}

impl AppState {
    pub fn new(blockchain: SharedChain, peers: Arc<PeerRegistry>) -> Self {
        Self {
            blockchain,
            miner: MiningHandle::new(),
            peers,
        }
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse<'a> {
    pub length: usize,
    pub chain: &'a [Block],
}

#[derive(Deserialize)]
pub struct MineRequest {
    #[serde(default)]
    pub data: Value,
}

#[derive(Serialize, Deserialize)]
pub struct CancelResponse {
    pub cancelled: usize,
}

/* ---------- Peer API Models ---------- */

#[derive(Serialize)]
pub struct PeersResponse {
    pub connected: usize,
    pub peers: Vec<PeerInfo>,
}
