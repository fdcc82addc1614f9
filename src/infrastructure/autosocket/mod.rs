// AutoSocket module - Automatic TCP client/server role negotiation
use crate::core::transport::{Transport, TransportEvent, TransportKind};
use crate::domain::config::AutoSocketRetryConfig;
use crate::domain::error::{TermLineError, TermLineResult};
use crate::infrastructure::tcp::{TcpClientTransport, TcpServerTransport};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Role negotiation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSocketState {
    Reset,
    Starting,
    Connecting,
    Connected,
    ConnectingFailed,
    StartingListening,
    Listening,
    ListeningFailed,
    Accepted,
    Restarting,
    Stopping,
    Error,
}

impl std::fmt::Display for AutoSocketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AutoSocketState::Reset => "Reset",
            AutoSocketState::Starting => "Starting",
            AutoSocketState::Connecting => "Connecting",
            AutoSocketState::Connected => "Connected",
            AutoSocketState::ConnectingFailed => "ConnectingFailed",
            AutoSocketState::StartingListening => "StartingListening",
            AutoSocketState::Listening => "Listening",
            AutoSocketState::ListeningFailed => "ListeningFailed",
            AutoSocketState::Accepted => "Accepted",
            AutoSocketState::Restarting => "Restarting",
            AutoSocketState::Stopping => "Stopping",
            AutoSocketState::Error => "Error",
        };
        write!(f, "{}", name)
    }
}

/// At most one of client/server exists at any time; the other is gone, not
/// merely idle.
enum InnerSocket {
    None,
    Client(TcpClientTransport),
    Server(TcpServerTransport),
}

impl InnerSocket {
    fn kind(&self) -> Option<TransportKind> {
        match self {
            InnerSocket::None => None,
            InnerSocket::Client(_) => Some(TransportKind::TcpClient),
            InnerSocket::Server(_) => Some(TransportKind::TcpServer),
        }
    }

    async fn stop(&mut self) {
        match self {
            InnerSocket::None => {}
            InnerSocket::Client(client) => {
                let _ = client.stop().await;
            }
            InnerSocket::Server(server) => {
                let _ = server.stop().await;
            }
        }
        *self = InnerSocket::None;
    }
}

/// TCP transport that negotiates its role automatically: connect as a
/// client if a peer is already listening, otherwise become the server.
///
/// Two peers running the same configuration find each other without
/// pre-assigned roles; whichever starts second sees the first listening.
pub struct AutoSocketTransport {
    remote_host: String,
    remote_port: u16,
    local_bind: String,
    retry: AutoSocketRetryConfig,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    state: Arc<Mutex<AutoSocketState>>,
    inner: Arc<Mutex<InnerSocket>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    supervisor: Option<tokio::task::JoinHandle<()>>,
    started: bool,
}

impl AutoSocketTransport {
    pub fn new(
        remote_host: String,
        remote_port: u16,
        local_bind: String,
        retry: AutoSocketRetryConfig,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            remote_host,
            remote_port,
            local_bind,
            retry,
            event_tx,
            state: Arc::new(Mutex::new(AutoSocketState::Reset)),
            inner: Arc::new(Mutex::new(InnerSocket::None)),
            shutdown_tx: None,
            supervisor: None,
            started: false,
        }
    }

    /// Current negotiation state
    pub async fn state(&self) -> AutoSocketState {
        *self.state.lock().await
    }

    /// Which role is currently instantiated, if any
    pub async fn role(&self) -> Option<TransportKind> {
        self.inner.lock().await.kind()
    }
}

struct Supervisor {
    remote_host: String,
    remote_port: u16,
    local_bind: String,
    retry: AutoSocketRetryConfig,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    state: Arc<Mutex<AutoSocketState>>,
    inner: Arc<Mutex<InnerSocket>>,
}

enum CycleOutcome {
    /// Inner transport failed after running; restart the full cycle with a
    /// fresh retry budget
    Restart,
    /// Neither role could be started this cycle
    CycleFailed,
    /// Stop was requested
    Shutdown,
}

impl Supervisor {
    async fn set_state(&self, state: AutoSocketState) {
        debug!("AutoSocket state -> {}", state);
        *self.state.lock().await = state;
    }

    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut cycles = 0u32;

        loop {
            match self.run_cycle(&mut shutdown_rx).await {
                CycleOutcome::Restart => {
                    cycles = 0;
                    self.set_state(AutoSocketState::Restarting).await;
                    let _ = self.event_tx.send(TransportEvent::Changed);
                }
                CycleOutcome::CycleFailed => {
                    cycles += 1;
                    if cycles >= self.retry.max_start_cycles {
                        self.set_state(AutoSocketState::Error).await;
                        let _ = self.event_tx.send(TransportEvent::Error(
                            "AutoSocket could neither be started as client nor server".to_string(),
                        ));
                        let _ = self.event_tx.send(TransportEvent::Changed);
                        return;
                    }

                    let wait = {
                        let mut rng = rand::thread_rng();
                        rng.gen_range(self.retry.min_backoff_ms..=self.retry.max_backoff_ms)
                    };
                    debug!("AutoSocket cycle {} failed, backing off {} ms", cycles, wait);
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(wait)) => {}
                        _ = shutdown_rx.recv() => return,
                    }
                }
                CycleOutcome::Shutdown => return,
            }
        }
    }

    /// One client-then-server attempt, running the winning role until it
    /// fails or a stop is requested
    async fn run_cycle(&self, shutdown_rx: &mut mpsc::Receiver<()>) -> CycleOutcome {
        // Client first: a peer may already be listening
        self.set_state(AutoSocketState::Connecting).await;
        let (inner_tx, mut inner_rx) = mpsc::unbounded_channel();
        let mut client = TcpClientTransport::new(
            self.remote_host.clone(),
            self.remote_port,
            self.retry.connect_timeout_ms,
            inner_tx,
        );

        match client.start().await {
            Ok(()) => {
                *self.inner.lock().await = InnerSocket::Client(client);
                self.set_state(AutoSocketState::Connected).await;
                info!(
                    "AutoSocket connected as client to {}:{}",
                    self.remote_host, self.remote_port
                );
                let _ = self.event_tx.send(TransportEvent::Changed);

                let outcome = self.forward_until_failure(&mut inner_rx, shutdown_rx, false).await;
                self.inner.lock().await.stop().await;
                return outcome;
            }
            Err(e) => {
                self.set_state(AutoSocketState::ConnectingFailed).await;
                debug!("AutoSocket client attempt failed: {}", e);
            }
        }

        // No peer listening: become the server
        self.set_state(AutoSocketState::StartingListening).await;
        let (inner_tx, mut inner_rx) = mpsc::unbounded_channel();
        let mut server = TcpServerTransport::new(self.local_bind.clone(), inner_tx);

        match server.start().await {
            Ok(()) => {
                *self.inner.lock().await = InnerSocket::Server(server);
                self.set_state(AutoSocketState::Listening).await;
                info!("AutoSocket listening as server on {}", self.local_bind);
                let _ = self.event_tx.send(TransportEvent::Changed);

                let outcome = self.forward_until_failure(&mut inner_rx, shutdown_rx, true).await;
                self.inner.lock().await.stop().await;
                outcome
            }
            Err(e) => {
                self.set_state(AutoSocketState::ListeningFailed).await;
                warn!("AutoSocket server attempt failed: {}", e);
                CycleOutcome::CycleFailed
            }
        }
    }

    /// Forward inner transport events to the owner until the inner
    /// transport reports an error (lost connection, accept failure) or a
    /// stop is requested.
    async fn forward_until_failure(
        &self,
        inner_rx: &mut mpsc::UnboundedReceiver<TransportEvent>,
        shutdown_rx: &mut mpsc::Receiver<()>,
        is_server: bool,
    ) -> CycleOutcome {
        loop {
            tokio::select! {
                event = inner_rx.recv() => {
                    match event {
                        Some(TransportEvent::DataReceived) => {
                            let _ = self.event_tx.send(TransportEvent::DataReceived);
                        }
                        Some(TransportEvent::Changed) => {
                            if is_server {
                                // Peer topology changed: Accepted while at
                                // least one peer is connected
                                let connected = match &*self.inner.lock().await {
                                    InnerSocket::Server(server) => server.is_connected().await,
                                    _ => false,
                                };
                                self.set_state(if connected {
                                    AutoSocketState::Accepted
                                } else {
                                    AutoSocketState::Listening
                                })
                                .await;
                            }
                            let _ = self.event_tx.send(TransportEvent::Changed);
                        }
                        Some(TransportEvent::ControlChanged) => {
                            let _ = self.event_tx.send(TransportEvent::ControlChanged);
                        }
                        Some(TransportEvent::Error(message)) => {
                            // Lost connection or accept failure: the whole
                            // client/server cycle repeats
                            let _ = self.event_tx.send(TransportEvent::Error(message));
                            return CycleOutcome::Restart;
                        }
                        None => return CycleOutcome::Restart,
                    }
                }
                _ = shutdown_rx.recv() => return CycleOutcome::Shutdown,
            }
        }
    }
}

#[async_trait]
impl Transport for AutoSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::AutoSocket
    }

    async fn start(&mut self) -> TermLineResult<()> {
        if self.started {
            // A fatally failed coordinator may be started again; a running
            // one may not
            if *self.state.lock().await != AutoSocketState::Error {
                return Err(TermLineError::Transport {
                    message: "AutoSocket is already started".to_string(),
                });
            }
            self.shutdown_tx = None;
            if let Some(handle) = self.supervisor.take() {
                handle.abort();
            }
        }

        *self.state.lock().await = AutoSocketState::Starting;
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let supervisor = Supervisor {
            remote_host: self.remote_host.clone(),
            remote_port: self.remote_port,
            local_bind: self.local_bind.clone(),
            retry: self.retry.clone(),
            event_tx: self.event_tx.clone(),
            state: Arc::clone(&self.state),
            inner: Arc::clone(&self.inner),
        };
        self.supervisor = Some(tokio::spawn(supervisor.run(shutdown_rx)));
        self.shutdown_tx = Some(shutdown_tx);
        self.started = true;
        info!("AutoSocket started");
        Ok(())
    }

    async fn stop(&mut self) -> TermLineResult<()> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        *self.state.lock().await = AutoSocketState::Stopping;

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }
        if let Some(mut handle) = self.supervisor.take() {
            // Give the supervisor a moment to exit on its own, then force it
            if tokio::time::timeout(Duration::from_millis(500), &mut handle)
                .await
                .is_err()
            {
                warn!("AutoSocket supervisor did not stop in time");
                handle.abort();
            }
        }
        self.inner.lock().await.stop().await;
        *self.state.lock().await = AutoSocketState::Reset;
        let _ = self.event_tx.send(TransportEvent::Changed);
        info!("AutoSocket stopped");
        Ok(())
    }

    async fn send(&self, data: Vec<u8>) -> TermLineResult<()> {
        match &*self.inner.lock().await {
            InnerSocket::Client(client) => client.send(data).await,
            InnerSocket::Server(server) => server.send(data).await,
            InnerSocket::None => Err(TermLineError::NotConnected),
        }
    }

    async fn receive(&self) -> Vec<u8> {
        match &*self.inner.lock().await {
            InnerSocket::Client(client) => client.receive().await,
            InnerSocket::Server(server) => server.receive().await,
            InnerSocket::None => Vec::new(),
        }
    }

    fn has_started(&self) -> bool {
        self.started
    }

    async fn is_connected(&self) -> bool {
        matches!(
            *self.state.lock().await,
            AutoSocketState::Connected | AutoSocketState::Accepted
        )
    }

    async fn bytes_available(&self) -> usize {
        match &*self.inner.lock().await {
            InnerSocket::Client(client) => client.bytes_available().await,
            InnerSocket::Server(server) => server.bytes_available().await,
            InnerSocket::None => 0,
        }
    }

    fn underlying(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for AutoSocketTransport {
    fn drop(&mut self) {
        if let Some(handle) = &self.supervisor {
            handle.abort();
        }
    }
}
