use crate::core::transport::{Transport, TransportEvent, TransportKind};
use crate::domain::error::{TermLineError, TermLineResult};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

struct Peer {
    addr: SocketAddr,
    writer: mpsc::UnboundedSender<Vec<u8>>,
}

/// TCP server transport: listens on one address, merges traffic from all
/// connected peers and broadcasts sends to every peer.
pub struct TcpServerTransport {
    bind: String,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    inbound: Arc<Mutex<Vec<u8>>>,
    peers: Arc<Mutex<Vec<Peer>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    accept_handle: Option<tokio::task::JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    started: bool,
}

impl TcpServerTransport {
    pub fn new(bind: String, event_tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            bind,
            event_tx,
            inbound: Arc::new(Mutex::new(Vec::new())),
            peers: Arc::new(Mutex::new(Vec::new())),
            shutdown_tx: None,
            accept_handle: None,
            local_addr: None,
            started: false,
        }
    }

    /// Actual bound address, useful when binding to port 0
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.lock().await.len()
    }

    async fn handle_peer(
        stream: TcpStream,
        addr: SocketAddr,
        peers: Arc<Mutex<Vec<Peer>>>,
        inbound: Arc<Mutex<Vec<u8>>>,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) {
        let (mut read_half, mut write_half) = stream.into_split();
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        {
            let mut peers_guard = peers.lock().await;
            peers_guard.push(Peer {
                addr,
                writer: writer_tx,
            });
        }
        info!("Peer connected: {}", addr);
        let _ = event_tx.send(TransportEvent::Changed);

        // Writer half, fed by broadcast sends
        let writer_handle = tokio::spawn(async move {
            while let Some(data) = writer_rx.recv().await {
                if write_half.write_all(&data).await.is_err() {
                    break;
                }
                let _ = write_half.flush().await;
            }
        });

        // Reader half
        let mut buffer = vec![0u8; 4096];
        loop {
            match read_half.read(&mut buffer).await {
                Ok(0) => {
                    debug!("Peer {} disconnected", addr);
                    break;
                }
                Ok(n) => {
                    debug!("Received {} bytes from {}", n, addr);
                    inbound.lock().await.extend_from_slice(&buffer[..n]);
                    let _ = event_tx.send(TransportEvent::DataReceived);
                }
                Err(e) => {
                    error!("Read error from {}: {}", addr, e);
                    break;
                }
            }
        }

        writer_handle.abort();
        {
            let mut peers_guard = peers.lock().await;
            peers_guard.retain(|p| p.addr != addr);
        }
        info!("Peer removed: {}", addr);
        let _ = event_tx.send(TransportEvent::Changed);
    }
}

#[async_trait]
impl Transport for TcpServerTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::TcpServer
    }

    async fn start(&mut self) -> TermLineResult<()> {
        if self.started {
            return Err(TermLineError::Transport {
                message: "TCP server is already started".to_string(),
            });
        }

        let listener = TcpListener::bind(&self.bind)
            .await
            .map_err(|e| TermLineError::Transport {
                message: format!("Failed to bind to {}: {}", self.bind, e),
            })?;
        let local_addr = listener.local_addr().map_err(|e| TermLineError::Transport {
            message: format!("Failed to get local address: {}", e),
        })?;
        self.local_addr = Some(local_addr);
        info!("TCP server listening on {}", local_addr);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let peers = Arc::clone(&self.peers);
        let inbound = Arc::clone(&self.inbound);
        let event_tx = self.event_tx.clone();

        let accept_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, addr)) => {
                                stream.set_nodelay(true).ok();
                                tokio::spawn(Self::handle_peer(
                                    stream,
                                    addr,
                                    Arc::clone(&peers),
                                    Arc::clone(&inbound),
                                    event_tx.clone(),
                                ));
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {}", e);
                                let _ = event_tx.send(TransportEvent::Error(format!(
                                    "Accept failed: {}",
                                    e
                                )));
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("TCP server shutting down");
                        break;
                    }
                }
            }
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.accept_handle = Some(accept_handle);
        self.started = true;
        let _ = self.event_tx.send(TransportEvent::Changed);
        Ok(())
    }

    async fn stop(&mut self) -> TermLineResult<()> {
        if !self.started {
            return Ok(());
        }
        self.started = false;

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }
        if let Some(handle) = self.accept_handle.take() {
            handle.abort();
        }
        self.peers.lock().await.clear();
        self.local_addr = None;
        let _ = self.event_tx.send(TransportEvent::Changed);
        info!("TCP server stopped");
        Ok(())
    }

    async fn send(&self, data: Vec<u8>) -> TermLineResult<()> {
        if !self.started {
            return Err(TermLineError::NotConnected);
        }
        let peers = self.peers.lock().await;
        if peers.is_empty() {
            return Err(TermLineError::NotConnected);
        }
        for peer in peers.iter() {
            let _ = peer.writer.send(data.clone());
        }
        debug!("Broadcast {} bytes to {} peers", data.len(), peers.len());
        Ok(())
    }

    async fn receive(&self) -> Vec<u8> {
        std::mem::take(&mut *self.inbound.lock().await)
    }

    fn has_started(&self) -> bool {
        self.started
    }

    async fn is_connected(&self) -> bool {
        self.started && !self.peers.lock().await.is_empty()
    }

    async fn bytes_available(&self) -> usize {
        self.inbound.lock().await.len()
    }

    fn underlying(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for TcpServerTransport {
    fn drop(&mut self) {
        if let Some(handle) = &self.accept_handle {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_server_start_stop() {
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let mut server = TcpServerTransport::new("127.0.0.1:0".to_string(), event_tx);

        server.start().await.unwrap();
        assert!(server.has_started());
        assert!(server.local_addr().is_some());
        assert!(!server.is_connected().await);

        // Double start fails
        assert!(server.start().await.is_err());

        server.stop().await.unwrap();
        assert!(!server.has_started());
    }

    #[tokio::test]
    async fn test_server_receives_and_broadcasts() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut server = TcpServerTransport::new("127.0.0.1:0".to_string(), event_tx);
        server.start().await.unwrap();
        let addr = server.local_addr().unwrap();

        let mut peer = TcpStream::connect(addr).await.unwrap();
        peer.write_all(b"hello").await.unwrap();
        peer.flush().await.unwrap();

        loop {
            match event_rx.recv().await.unwrap() {
                TransportEvent::DataReceived => break,
                _ => continue,
            }
        }
        assert_eq!(server.receive().await, b"hello");
        assert!(server.is_connected().await);
        assert_eq!(server.peer_count().await, 1);

        server.send(b"world".to_vec()).await.unwrap();
        let mut buf = [0u8; 5];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"world");

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_without_peers_errors() {
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let mut server = TcpServerTransport::new("127.0.0.1:0".to_string(), event_tx);
        server.start().await.unwrap();

        assert!(matches!(
            server.send(b"x".to_vec()).await,
            Err(TermLineError::NotConnected)
        ));
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_changed_on_peer_disconnect() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut server = TcpServerTransport::new("127.0.0.1:0".to_string(), event_tx);
        server.start().await.unwrap();
        let addr = server.local_addr().unwrap();
        // Drop the Changed emitted by start itself
        while event_rx.try_recv().is_ok() {}

        let peer = TcpStream::connect(addr).await.unwrap();
        drop(peer);

        // Connect + disconnect both produce Changed; wait until the peer
        // list is empty again
        let mut changes = 0;
        while changes < 2 {
            match tokio::time::timeout(Duration::from_secs(1), event_rx.recv())
                .await
                .unwrap()
                .unwrap()
            {
                TransportEvent::Changed => changes += 1,
                _ => continue,
            }
        }
        assert_eq!(server.peer_count().await, 0);
        assert!(!server.is_connected().await);

        server.stop().await.unwrap();
    }
}
