//! Proof-of-Work blocks and a WebSocket gossip layer for a minimal node.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod miner;
pub mod p2p;
