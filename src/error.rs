use thiserror::Error;

/// Reasons a block is rejected by `Block::verify` or the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("hash mismatch: stored {stored}, computed {computed}")]
    HashMismatch { stored: String, computed: String },

    #[error("hash {hash} does not meet difficulty {difficulty}")]
    InsufficientWork { hash: String, difficulty: i32 },

    #[error("unknown genesis block {hash}")]
    UnknownGenesis { hash: String },

    #[error("block does not link to tip: expected last_hash {expected}, got {got}")]
    BrokenLink { expected: String, got: String },
}

#[derive(Debug, Error)]
pub enum P2pError {
    #[error("failed to bind p2p listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dial to {peer} timed out")]
    DialTimeout { peer: String },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("send to peer timed out")]
    SendTimeout,

    #[error("malformed chain message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("peer sent an empty chain")]
    EmptyChain,

    #[error("block {index} rejected: {source}")]
    InvalidBlock {
        index: usize,
        #[source]
        source: BlockError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
