use crate::core::transport::{Transport, TransportEvent, TransportKind};
use crate::domain::error::{TermLineError, TermLineResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

/// TCP client transport: one outbound connection to a fixed peer
pub struct TcpClientTransport {
    host: String,
    port: u16,
    connect_timeout_ms: u64,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    inbound: Arc<Mutex<Vec<u8>>>,
    connected: Arc<AtomicBool>,
    writer: Option<mpsc::UnboundedSender<Vec<u8>>>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
    started: bool,
}

impl TcpClientTransport {
    pub fn new(
        host: String,
        port: u16,
        connect_timeout_ms: u64,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            host,
            port,
            connect_timeout_ms,
            event_tx,
            inbound: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(false)),
            writer: None,
            tasks: Vec::new(),
            started: false,
        }
    }
}

#[async_trait]
impl Transport for TcpClientTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::TcpClient
    }

    async fn start(&mut self) -> TermLineResult<()> {
        if self.started {
            return Err(TermLineError::Transport {
                message: "TCP client is already started".to_string(),
            });
        }

        let stream = tokio::time::timeout(
            Duration::from_millis(self.connect_timeout_ms),
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| TermLineError::Transport {
            message: format!("Connection timeout to {}:{}", self.host, self.port),
        })?
        .map_err(|e| TermLineError::Transport {
            message: format!("Failed to connect to {}:{}: {}", self.host, self.port, e),
        })?;

        stream.set_nodelay(true).ok();
        info!("TCP connection established to {}:{}", self.host, self.port);

        let (mut read_half, mut write_half) = stream.into_split();
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        self.connected.store(true, Ordering::SeqCst);

        // TX task - drains the writer channel into the socket
        let event_tx = self.event_tx.clone();
        let connected = Arc::clone(&self.connected);
        self.tasks.push(tokio::spawn(async move {
            while let Some(data) = writer_rx.recv().await {
                if let Err(e) = write_half.write_all(&data).await {
                    error!("Failed to write to TCP stream: {}", e);
                    connected.store(false, Ordering::SeqCst);
                    let _ = event_tx.send(TransportEvent::Error(format!(
                        "TCP write failed: {}",
                        e
                    )));
                    let _ = event_tx.send(TransportEvent::Changed);
                    break;
                }
                if let Err(e) = write_half.flush().await {
                    error!("Failed to flush TCP stream: {}", e);
                    break;
                }
                debug!("Sent {} bytes over TCP", data.len());
            }
        }));

        // RX task - queues inbound bytes and signals DataReceived
        let event_tx = self.event_tx.clone();
        let connected = Arc::clone(&self.connected);
        let inbound = Arc::clone(&self.inbound);
        self.tasks.push(tokio::spawn(async move {
            let mut buffer = vec![0u8; 4096];
            loop {
                match read_half.read(&mut buffer).await {
                    Ok(0) => {
                        info!("TCP connection closed by peer");
                        connected.store(false, Ordering::SeqCst);
                        let _ = event_tx.send(TransportEvent::Changed);
                        let _ = event_tx
                            .send(TransportEvent::Error("Connection closed by peer".to_string()));
                        break;
                    }
                    Ok(n) => {
                        debug!("Received {} bytes over TCP", n);
                        inbound.lock().await.extend_from_slice(&buffer[..n]);
                        let _ = event_tx.send(TransportEvent::DataReceived);
                    }
                    Err(e) => {
                        error!("Failed to read from TCP stream: {}", e);
                        connected.store(false, Ordering::SeqCst);
                        let _ = event_tx.send(TransportEvent::Changed);
                        let _ =
                            event_tx.send(TransportEvent::Error(format!("TCP read failed: {}", e)));
                        break;
                    }
                }
            }
        }));

        self.writer = Some(writer_tx);
        self.started = true;
        let _ = self.event_tx.send(TransportEvent::Changed);
        Ok(())
    }

    async fn stop(&mut self) -> TermLineResult<()> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        self.writer = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.event_tx.send(TransportEvent::Changed);
        info!("TCP client stopped");
        Ok(())
    }

    async fn send(&self, data: Vec<u8>) -> TermLineResult<()> {
        let writer = self.writer.as_ref().ok_or(TermLineError::NotConnected)?;
        writer.send(data).map_err(|e| TermLineError::Transport {
            message: format!("Failed to queue data for TCP send: {}", e),
        })
    }

    async fn receive(&self) -> Vec<u8> {
        std::mem::take(&mut *self.inbound.lock().await)
    }

    fn has_started(&self) -> bool {
        self.started
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn bytes_available(&self) -> usize {
        self.inbound.lock().await.len()
    }

    fn underlying(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for TcpClientTransport {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_client_connect_failure() {
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        // Nothing listens on this port of TEST-NET-1
        let mut client = TcpClientTransport::new("192.0.2.1".to_string(), 12345, 100, event_tx);
        let result = client.start().await;
        assert!(result.is_err());
        assert!(!client.has_started());
    }

    #[tokio::test]
    async fn test_client_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Echo peer
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                if let Ok(n) = socket.read(&mut buf).await {
                    let _ = socket.write_all(&buf[..n]).await;
                }
            }
        });

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut client =
            TcpClientTransport::new(addr.ip().to_string(), addr.port(), 1000, event_tx);
        client.start().await.unwrap();
        assert!(client.is_connected().await);

        client.send(b"ping".to_vec()).await.unwrap();

        // Wait for the echo to arrive
        loop {
            match event_rx.recv().await.unwrap() {
                TransportEvent::DataReceived => break,
                _ => continue,
            }
        }
        assert_eq!(client.receive().await, b"ping");
        assert_eq!(client.bytes_available().await, 0);

        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_stop_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let mut client =
            TcpClientTransport::new(addr.ip().to_string(), addr.port(), 1000, event_tx);
        client.start().await.unwrap();
        client.stop().await.unwrap();

        assert!(client.send(b"late".to_vec()).await.is_err());
    }
}
