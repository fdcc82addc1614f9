use crate::domain::{config::TransportConfig, error::TermLineResult};
use crate::infrastructure::{
    autosocket::AutoSocketTransport, serial::SerialTransport, tcp::TcpClientTransport,
    tcp::TcpServerTransport, udp::UdpTransport,
};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Transport type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Serial,
    TcpClient,
    TcpServer,
    Udp,
    AutoSocket,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Serial => write!(f, "serial"),
            TransportKind::TcpClient => write!(f, "tcp-client"),
            TransportKind::TcpServer => write!(f, "tcp-server"),
            TransportKind::Udp => write!(f, "udp"),
            TransportKind::AutoSocket => write!(f, "auto-socket"),
        }
    }
}

/// Event pushed by a transport into its owner's channel
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Connection status or topology changed
    Changed,
    /// Control-line or flow state changed
    ControlChanged,
    /// Non-fatal transport fault, payload is the original message
    Error(String),
    /// Inbound bytes are queued and ready to `receive`
    DataReceived,
}

/// Uniform contract over a physical or network channel.
///
/// Implementations push [`TransportEvent`]s into the channel supplied at
/// construction and queue inbound bytes until the owner drains them with
/// [`Transport::receive`].
#[async_trait]
pub trait Transport: Send {
    /// Get the transport kind
    fn kind(&self) -> TransportKind;

    /// Open the channel and spawn background I/O tasks
    async fn start(&mut self) -> TermLineResult<()>;

    /// Close the channel and stop background I/O tasks
    async fn stop(&mut self) -> TermLineResult<()>;

    /// Queue outbound bytes. Errors after `stop`, never silently drops.
    async fn send(&self, data: Vec<u8>) -> TermLineResult<()>;

    /// Drain all currently queued inbound bytes in one atomic step.
    /// Returns an empty vector if nothing is queued.
    async fn receive(&self) -> Vec<u8>;

    /// Whether `start` has completed and `stop` has not been called
    fn has_started(&self) -> bool;

    /// Whether a peer is currently reachable (serial ports report their
    /// open state here)
    async fn is_connected(&self) -> bool;

    /// Number of queued inbound bytes
    async fn bytes_available(&self) -> usize;

    /// Concrete implementation behind the trait object, for callers that
    /// need transport-specific accessors such as a server's bound address
    fn underlying(&self) -> &dyn std::any::Any;
}

/// Build the transport described by the configuration, wiring its events
/// into `event_tx`.
pub fn create_transport(
    config: &TransportConfig,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
) -> Box<dyn Transport> {
    match config {
        TransportConfig::Serial { .. } => Box::new(SerialTransport::new(config.clone(), event_tx)),
        TransportConfig::TcpClient {
            host,
            port,
            connect_timeout_ms,
        } => Box::new(TcpClientTransport::new(
            host.clone(),
            *port,
            *connect_timeout_ms,
            event_tx,
        )),
        TransportConfig::TcpServer { bind } => {
            Box::new(TcpServerTransport::new(bind.clone(), event_tx))
        }
        TransportConfig::Udp { local, remote } => {
            Box::new(UdpTransport::new(local.clone(), remote.clone(), event_tx))
        }
        TransportConfig::AutoSocket {
            remote_host,
            remote_port,
            local_bind,
            retry,
        } => Box::new(AutoSocketTransport::new(
            remote_host.clone(),
            *remote_port,
            local_bind.clone(),
            retry.clone(),
            event_tx,
        )),
    }
}
