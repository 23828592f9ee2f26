use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::{Block, BlockError, PowParams};

/// Read-only view of the ledger used by the gossip layer.
pub trait ChainSource: Send + Sync {
    /// Ordered copy of the current chain, genesis first.
    fn snapshot(&self) -> Vec<Block>;

    /// Number of blocks, genesis included.
    fn height(&self) -> usize {
        self.snapshot().len()
    }
}

/// Simple in-memory chain. Holds no validation or fork-choice logic beyond
/// checking that an appended block extends the tip.
#[derive(Debug)]
pub struct Blockchain {
    pub chain: Vec<Block>,
    params: PowParams,
}

pub type SharedChain = Arc<Mutex<Blockchain>>;

impl Blockchain {
    /// Initialize a new blockchain with a genesis block.
    pub fn new(params: PowParams) -> Self {
        Self {
            chain: vec![Block::genesis(&params)],
            params,
        }
    }

    pub fn shared(params: PowParams) -> SharedChain {
        Arc::new(Mutex::new(Self::new(params)))
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("Blockchain should always have at least the genesis block")
    }

    pub fn params(&self) -> &PowParams {
        &self.params
    }

    /// Mine and append a new block carrying `data`. Blocks the calling thread.
    pub fn add_block(&mut self, data: Value) -> &Block {
        let block = Block::mine(self.last_block(), data, &self.params);
        self.chain.push(block);
        self.last_block()
    }

    /// Append a block mined elsewhere. It must extend the tip and verify.
    pub fn append(&mut self, block: Block) -> Result<&Block, BlockError> {
        let tip = &self.last_block().hash;
        if block.last_hash != *tip {
            return Err(BlockError::BrokenLink {
                expected: tip.clone(),
                got: block.last_hash,
            });
        }
        block.verify()?;
        self.chain.push(block);
        Ok(self.last_block())
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }
}

impl ChainSource for Mutex<Blockchain> {
    fn snapshot(&self) -> Vec<Block> {
        self.lock().expect("mutex poisoned").chain.clone()
    }

    fn height(&self) -> usize {
        self.lock().expect("mutex poisoned").len()
    }
}
