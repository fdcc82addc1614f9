// UDP module - Connected-datagram transport
use crate::core::transport::{Transport, TransportEvent, TransportKind};
use crate::domain::error::{TermLineError, TermLineResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

/// UDP transport bound to a local address and talking to one fixed remote
/// peer.
///
/// UDP has no connection state; `is_connected` reports whether the socket
/// is bound and running.
pub struct UdpTransport {
    local: String,
    remote: String,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    inbound: Arc<Mutex<Vec<u8>>>,
    socket: Option<Arc<UdpSocket>>,
    rx_handle: Option<tokio::task::JoinHandle<()>>,
    started: bool,
}

impl UdpTransport {
    pub fn new(
        local: String,
        remote: String,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            local,
            remote,
            event_tx,
            inbound: Arc::new(Mutex::new(Vec::new())),
            socket: None,
            rx_handle: None,
            started: false,
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    async fn start(&mut self) -> TermLineResult<()> {
        if self.started {
            return Err(TermLineError::Transport {
                message: "UDP transport is already started".to_string(),
            });
        }

        let socket = UdpSocket::bind(&self.local)
            .await
            .map_err(|e| TermLineError::Transport {
                message: format!("Failed to bind UDP socket to {}: {}", self.local, e),
            })?;
        socket
            .connect(&self.remote)
            .await
            .map_err(|e| TermLineError::Transport {
                message: format!("Failed to set UDP peer {}: {}", self.remote, e),
            })?;
        info!("UDP socket bound to {} with peer {}", self.local, self.remote);

        let socket = Arc::new(socket);
        let rx_socket = Arc::clone(&socket);
        let inbound = Arc::clone(&self.inbound);
        let event_tx = self.event_tx.clone();

        self.rx_handle = Some(tokio::spawn(async move {
            let mut buffer = vec![0u8; 65536];
            loop {
                match rx_socket.recv(&mut buffer).await {
                    Ok(n) => {
                        debug!("Received {} bytes over UDP", n);
                        inbound.lock().await.extend_from_slice(&buffer[..n]);
                        let _ = event_tx.send(TransportEvent::DataReceived);
                    }
                    Err(e) => {
                        error!("Failed to read from UDP socket: {}", e);
                        let _ =
                            event_tx.send(TransportEvent::Error(format!("UDP read failed: {}", e)));
                        break;
                    }
                }
            }
        }));

        self.socket = Some(socket);
        self.started = true;
        let _ = self.event_tx.send(TransportEvent::Changed);
        Ok(())
    }

    async fn stop(&mut self) -> TermLineResult<()> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        if let Some(handle) = self.rx_handle.take() {
            handle.abort();
        }
        self.socket = None;
        let _ = self.event_tx.send(TransportEvent::Changed);
        info!("UDP transport stopped");
        Ok(())
    }

    async fn send(&self, data: Vec<u8>) -> TermLineResult<()> {
        let socket = self.socket.as_ref().ok_or(TermLineError::NotConnected)?;
        socket
            .send(&data)
            .await
            .map_err(|e| TermLineError::Transport {
                message: format!("UDP send failed: {}", e),
            })?;
        debug!("Sent {} bytes over UDP", data.len());
        Ok(())
    }

    async fn receive(&self) -> Vec<u8> {
        std::mem::take(&mut *self.inbound.lock().await)
    }

    fn has_started(&self) -> bool {
        self.started
    }

    async fn is_connected(&self) -> bool {
        self.started
    }

    async fn bytes_available(&self) -> usize {
        self.inbound.lock().await.len()
    }

    fn underlying(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        if let Some(handle) = &self.rx_handle {
            handle.abort();
        }
    }
}
