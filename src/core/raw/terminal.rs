use crate::core::event::TerminalEvent;
use crate::core::raw::element::{Direction, RawElement};
use crate::core::raw::repository::{RawRepository, RepositoryKind};
use crate::core::transport::{create_transport, Transport, TransportEvent};
use crate::domain::config::{BufferConfig, TransportConfig};
use crate::domain::error::{TermLineError, TermLineResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

struct Repositories {
    tx: RawRepository,
    rx: RawRepository,
    bidir: RawRepository,
}

impl Repositories {
    fn new(buffers: &BufferConfig) -> Self {
        Self {
            tx: RawRepository::new(buffers.tx_capacity),
            rx: RawRepository::new(buffers.rx_capacity),
            bidir: RawRepository::new(buffers.bidir_capacity),
        }
    }

    fn get_mut(&mut self, kind: RepositoryKind) -> &mut RawRepository {
        match kind {
            RepositoryKind::Tx => &mut self.tx,
            RepositoryKind::Rx => &mut self.rx,
            RepositoryKind::Bidir => &mut self.bidir,
        }
    }
}

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<TerminalEvent>>>>;

/// Owns one transport and the three raw repositories; the single choke
/// point through which all bytes enter and leave the system.
///
/// Every send and every drained receive is captured synchronously as a
/// [`RawElement`] and republished to subscribers.
pub struct RawTerminal {
    transport: Arc<Mutex<Box<dyn Transport>>>,
    /// Handed to replacement transports when the configuration changes
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    repositories: Arc<Mutex<Repositories>>,
    subscribers: Subscribers,
    open: Arc<AtomicBool>,
    disposed: Arc<AtomicBool>,
    pump_handle: tokio::task::JoinHandle<()>,
}

impl RawTerminal {
    /// Build the terminal and its transport from configuration
    pub fn new(transport_config: &TransportConfig, buffers: &BufferConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let transport = create_transport(transport_config, event_tx.clone());
        Self::with_transport(transport, event_tx, event_rx, buffers)
    }

    /// Build the terminal around an existing transport whose events arrive
    /// on `events`
    pub fn with_transport(
        transport: Box<dyn Transport>,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        buffers: &BufferConfig,
    ) -> Self {
        let transport = Arc::new(Mutex::new(transport));
        let repositories = Arc::new(Mutex::new(Repositories::new(buffers)));
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));
        let open = Arc::new(AtomicBool::new(false));
        let disposed = Arc::new(AtomicBool::new(false));

        let pump_handle = Self::spawn_event_pump(
            events,
            Arc::clone(&transport),
            Arc::clone(&repositories),
            Arc::clone(&subscribers),
        );

        Self {
            transport,
            event_tx,
            repositories,
            subscribers,
            open,
            disposed,
            pump_handle,
        }
    }

    /// Replace the transport. An open terminal is closed first and reopened
    /// with the new transport afterwards.
    pub async fn set_transport_config(&self, config: &TransportConfig) -> TermLineResult<()> {
        self.check_disposed()?;
        let was_open = self.open.swap(false, Ordering::SeqCst);

        let mut transport = self.transport.lock().await;
        if was_open {
            transport.stop().await?;
            Self::publish_to(&self.subscribers, TerminalEvent::Closed).await;
        }
        *transport = create_transport(config, self.event_tx.clone());
        if was_open {
            transport.start().await?;
            self.open.store(true, Ordering::SeqCst);
            Self::publish_to(&self.subscribers, TerminalEvent::Opened).await;
        }
        info!("Transport configuration replaced");
        Ok(())
    }

    fn spawn_event_pump(
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        transport: Arc<Mutex<Box<dyn Transport>>>,
        repositories: Arc<Mutex<Repositories>>,
        subscribers: Subscribers,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::DataReceived => {
                        let data = {
                            let transport = transport.lock().await;
                            transport.receive().await
                        };
                        if data.is_empty() {
                            continue;
                        }
                        debug!("Captured {} rx bytes", data.len());

                        let element = Arc::new(RawElement::new(data, Direction::Rx));
                        {
                            let mut repos = repositories.lock().await;
                            repos.rx.push(Arc::clone(&element));
                            repos.bidir.push(Arc::clone(&element));
                        }
                        Self::publish_to(&subscribers, TerminalEvent::RawElementReceived(element))
                            .await;
                    }
                    TransportEvent::Changed => {
                        Self::publish_to(&subscribers, TerminalEvent::Changed).await;
                    }
                    TransportEvent::ControlChanged => {
                        Self::publish_to(&subscribers, TerminalEvent::ControlChanged).await;
                    }
                    TransportEvent::Error(message) => {
                        error!("Transport error: {}", message);
                        Self::publish_to(&subscribers, TerminalEvent::Error(message)).await;
                    }
                }
            }
        })
    }

    async fn publish_to(subscribers: &Subscribers, event: TerminalEvent) {
        // Senders are collected under the lock, written outside of it
        let senders: Vec<_> = subscribers.lock().await.iter().cloned().collect();
        for sender in senders {
            let _ = sender.send(event.clone());
        }
    }

    async fn publish(&self, event: TerminalEvent) {
        Self::publish_to(&self.subscribers, event).await;
    }

    fn check_disposed(&self) -> TermLineResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(TermLineError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Register a new event subscriber
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<TerminalEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().await.push(tx);
        rx
    }

    /// Start the transport
    pub async fn open(&self) -> TermLineResult<()> {
        self.check_disposed()?;
        if self.open.load(Ordering::SeqCst) {
            return Err(TermLineError::Terminal {
                message: "Terminal is already open".to_string(),
            });
        }

        self.transport.lock().await.start().await?;
        self.open.store(true, Ordering::SeqCst);
        info!("Terminal opened");
        self.publish(TerminalEvent::Opened).await;
        Ok(())
    }

    /// Stop the transport
    pub async fn close(&self) -> TermLineResult<()> {
        self.check_disposed()?;
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        self.transport.lock().await.stop().await?;
        info!("Terminal closed");
        self.publish(TerminalEvent::Closed).await;
        Ok(())
    }

    /// Forward bytes to the transport, then capture them as a tx element
    pub async fn send(&self, data: Vec<u8>) -> TermLineResult<()> {
        self.check_disposed()?;
        if !self.open.load(Ordering::SeqCst) {
            return Err(TermLineError::Terminal {
                message: "Cannot send while the terminal is closed".to_string(),
            });
        }

        self.transport.lock().await.send(data.clone()).await?;
        debug!("Captured {} tx bytes", data.len());

        let element = Arc::new(RawElement::new(data, Direction::Tx));
        {
            let mut repos = self.repositories.lock().await;
            repos.tx.push(Arc::clone(&element));
            repos.bidir.push(Arc::clone(&element));
        }
        self.publish(TerminalEvent::RawElementSent(element)).await;
        Ok(())
    }

    /// Truncate the named repository
    pub async fn clear_repository(&self, kind: RepositoryKind) -> TermLineResult<()> {
        self.check_disposed()?;
        self.repositories.lock().await.get_mut(kind).clear();
        info!("Repository {} cleared", kind);
        self.publish(TerminalEvent::RepositoryCleared(kind)).await;
        Ok(())
    }

    /// Snapshot of one repository in arrival order
    pub async fn repository_to_elements(&self, kind: RepositoryKind) -> Vec<Arc<RawElement>> {
        self.repositories.lock().await.get_mut(kind).to_elements()
    }

    /// Apply new repository capacities, re-trimming existing contents
    pub async fn set_buffer_config(&self, buffers: &BufferConfig) {
        let mut repos = self.repositories.lock().await;
        repos.tx.set_capacity(buffers.tx_capacity);
        repos.rx.set_capacity(buffers.rx_capacity);
        repos.bidir.set_capacity(buffers.bidir_capacity);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_connected().await
    }

    pub async fn bytes_available(&self) -> usize {
        self.transport.lock().await.bytes_available().await
    }

    /// Stop the transport and invalidate the terminal. Later operations
    /// return [`TermLineError::Disposed`].
    pub async fn dispose(&self) -> TermLineResult<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Err(TermLineError::Disposed);
        }
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.transport.lock().await.stop().await;
        }
        self.pump_handle.abort();
        info!("Terminal disposed");
        Ok(())
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        self.pump_handle.abort();
    }
}
