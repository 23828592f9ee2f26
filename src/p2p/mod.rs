pub mod handler;
pub mod registry;
pub mod server;

pub use handler::{ChainPolicy, LogMessages, MessageHandler, ReportChains, VerifyingHandler};
pub use registry::{PeerId, PeerInfo, PeerRegistry};
pub use server::P2pServer;
