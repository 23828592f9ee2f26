use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_async, connect_async};

use super::{LogMessages, MessageHandler, PeerId, PeerRegistry};
use crate::blockchain::ChainSource;
use crate::config::P2pConfig;
use crate::error::P2pError;

/// Gossip server: listens for peers, dials the static peer list, and pushes
/// the full chain to every socket as soon as it connects.
pub struct P2pServer {
    config: P2pConfig,
    chain: Arc<dyn ChainSource>,
    registry: Arc<PeerRegistry>,
    handler: Arc<dyn MessageHandler>,
}

impl P2pServer {
    pub fn new(config: P2pConfig, chain: Arc<dyn ChainSource>) -> Self {
        Self {
            config,
            chain,
            registry: Arc::new(PeerRegistry::new()),
            handler: Arc::new(LogMessages),
        }
    }

    /// Replace the default observe-only message handler.
    pub fn with_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn registry(&self) -> Arc<PeerRegistry> {
        self.registry.clone()
    }

    /// Bind the listener, spawn the accept loop and outbound dials.
    /// Returns the bound address (useful with port 0).
    pub async fn start(self: Arc<Self>) -> Result<SocketAddr, P2pError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| P2pError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local = listener
            .local_addr()
            .map_err(|source| P2pError::Bind { addr, source })?;

        tokio::spawn(self.clone().accept_loop(listener));
        self.connect_to_peers();

        info!("Listening for peer to peer connections on {local}");
        Ok(local)
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    let server = self.clone();
                    tokio::spawn(async move { server.accept_peer(stream, remote).await });
                }
                Err(e) => {
                    warn!("accept failed: {e}");
                    sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn accept_peer(self: Arc<Self>, stream: TcpStream, remote: SocketAddr) {
        match timeout(self.config.dial_timeout, accept_async(stream)).await {
            Ok(Ok(ws)) => {
                self.connect_socket(ws, remote.to_string());
            }
            Ok(Err(e)) => warn!("handshake with {remote} failed: {e}"),
            Err(_) => warn!("handshake with {remote} timed out"),
        }
    }

    fn connect_to_peers(self: &Arc<Self>) {
        for peer in &self.config.peers {
            let server = self.clone();
            let peer = peer.clone();
            tokio::spawn(async move { server.dial(peer).await });
        }
    }

    /// Dial with a bounded number of attempts, then give up on that peer.
    async fn dial(self: Arc<Self>, peer: String) {
        let attempts = self.config.dial_attempts.max(1);
        for attempt in 1..=attempts {
            let dialed = self.dial_once(&peer).await;
            match dialed {
                Ok(ws) => {
                    self.connect_socket(ws, peer);
                    return;
                }
                Err(e) => warn!("dial {peer} (attempt {attempt}/{attempts}): {e}"),
            }
            if attempt < attempts {
                sleep(self.config.dial_backoff).await;
            }
        }
        warn!("giving up on peer {peer}");
    }

    async fn dial_once(
        &self,
        peer: &str,
    ) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, P2pError> {
        let (ws, _response) = timeout(self.config.dial_timeout, connect_async(peer))
            .await
            .map_err(|_| P2pError::DialTimeout {
                peer: peer.to_string(),
            })??;
        Ok(ws)
    }

    /// Register the socket, attach the message handler, then push the chain
    /// snapshot to this socket only.
    fn connect_socket<S>(self: &Arc<Self>, ws: WebSocketStream<S>, addr: String) -> PeerId
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        let (outbox, inbox) = mpsc::unbounded_channel();

        let id = self.registry.add(addr.clone(), outbox);
        info!("Socket connected: peer {id} ({addr})");

        tokio::spawn(write_loop(sink, inbox, self.config.send_timeout, id));
        tokio::spawn(self.clone().message_handler(id, stream));

        match serde_json::to_string(&self.chain.snapshot()) {
            Ok(json) => {
                if !self.registry.send_to(id, Message::text(json)) {
                    warn!("peer {id} closed before chain snapshot was queued");
                }
            }
            Err(e) => warn!("failed to serialize chain for peer {id}: {e}"),
        }
        id
    }

    async fn message_handler<S>(
        self: Arc<Self>,
        peer: PeerId,
        mut stream: SplitStream<WebSocketStream<S>>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => self.handler.on_message(peer, text.as_str()),
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => self.handler.on_message(peer, text),
                    Err(_) => debug!("peer {peer} sent {} non-utf8 bytes", bytes.len()),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("peer {peer} read error: {e}");
                    break;
                }
            }
        }
        self.registry.remove(peer);
        info!("Socket closed: peer {peer}");
    }
}

async fn write_loop<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut inbox: UnboundedReceiver<Message>,
    send_timeout: Duration,
    peer: PeerId,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(message) = inbox.recv().await {
        if let Err(e) = send_frame(&mut sink, message, send_timeout).await {
            warn!("peer {peer} send failed: {e}");
            break;
        }
    }
    let _ = sink.close().await;
}

async fn send_frame<S>(
    sink: &mut SplitSink<WebSocketStream<S>, Message>,
    message: Message,
    send_timeout: Duration,
) -> Result<(), P2pError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    timeout(send_timeout, sink.send(message))
        .await
        .map_err(|_| P2pError::SendTimeout)??;
    Ok(())
}
