use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;

pub type PeerId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerInfo {
    pub id: PeerId,
    pub addr: String,
}

struct PeerEntry {
    addr: String,
    outbox: UnboundedSender<Message>,
}

/// Live peer connections keyed by connection id.
///
/// Each entry owns the sending half of that peer's outbox; dropping the entry
/// lets the peer's writer task drain and close the socket.
#[derive(Default)]
pub struct PeerRegistry {
    next_id: AtomicU64,
    peers: Mutex<HashMap<PeerId, PeerEntry>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, addr: String, outbox: UnboundedSender<Message>) -> PeerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut peers = self.peers.lock().expect("mutex poisoned");
        peers.insert(id, PeerEntry { addr, outbox });
        debug!("registry: +peer {id} ({} live)", peers.len());
        id
    }

    /// Returns false if the peer was already gone.
    pub fn remove(&self, id: PeerId) -> bool {
        let mut peers = self.peers.lock().expect("mutex poisoned");
        let removed = peers.remove(&id).is_some();
        if removed {
            debug!("registry: -peer {id} ({} live)", peers.len());
        }
        removed
    }

    /// Queue a frame for one peer. Never waits on the socket.
    pub fn send_to(&self, id: PeerId, message: Message) -> bool {
        let peers = self.peers.lock().expect("mutex poisoned");
        peers
            .get(&id)
            .is_some_and(|entry| entry.outbox.send(message).is_ok())
    }

    pub fn peers(&self) -> Vec<PeerInfo> {
        let peers = self.peers.lock().expect("mutex poisoned");
        let mut out: Vec<PeerInfo> = peers
            .iter()
            .map(|(id, entry)| PeerInfo {
                id: *id,
                addr: entry.addr.clone(),
            })
            .collect();
        out.sort_by_key(|p| p.id);
        out
    }

    pub fn len(&self) -> usize {
        self.peers.lock().expect("mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
