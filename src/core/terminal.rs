use crate::core::event::TerminalEvent;
use crate::core::line::display::DisplayLine;
use crate::core::line::engine::{LineEngine, LineSettings};
use crate::core::raw::element::{Direction, RawElement};
use crate::core::raw::repository::RepositoryKind;
use crate::core::raw::terminal::RawTerminal;
use crate::domain::config::{
    BufferConfig, DisplayConfig, GlobalConfig, LineBreakConfig, TerminalConfig, TerminalMode,
    TransportConfig,
};
use crate::domain::error::TermLineResult;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<TerminalEvent>>>>;

/// One terminal instance: a raw terminal feeding a line engine, with a
/// merged event stream.
///
/// Raw events are forwarded into the engine in arrival order, so the
/// per-direction ordering guarantee of the raw terminal carries over to the
/// produced display lines.
pub struct Terminal {
    id: Uuid,
    raw: Arc<RawTerminal>,
    engine: Arc<LineEngine>,
    subscribers: Subscribers,
    forward_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl Terminal {
    pub async fn new(config: &TerminalConfig, global: &GlobalConfig) -> Self {
        let id = Uuid::new_v4();
        let raw = Arc::new(RawTerminal::new(&config.transport, &config.buffers));
        let engine = Arc::new(LineEngine::new(line_settings(config, global)));
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));

        let mut forward_handles = Vec::new();

        // Raw events feed both the engine and the merged stream
        {
            let mut raw_events = raw.subscribe().await;
            let engine = Arc::clone(&engine);
            let subscribers = Arc::clone(&subscribers);
            forward_handles.push(tokio::spawn(async move {
                while let Some(event) = raw_events.recv().await {
                    match &event {
                        TerminalEvent::RawElementSent(element)
                        | TerminalEvent::RawElementReceived(element) => {
                            engine.process(Arc::clone(element));
                        }
                        _ => {}
                    }
                    publish_to(&subscribers, event).await;
                }
            }));
        }

        // Engine events join the merged stream
        {
            let mut engine_events = engine.subscribe().await;
            let subscribers = Arc::clone(&subscribers);
            forward_handles.push(tokio::spawn(async move {
                while let Some(event) = engine_events.recv().await {
                    publish_to(&subscribers, event).await;
                }
            }));
        }

        info!(terminal = %id, "Terminal created");
        Self {
            id,
            raw,
            engine,
            subscribers,
            forward_handles,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Register a subscriber for the merged raw + line event stream
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<TerminalEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().await.push(tx);
        rx
    }

    pub async fn open(&self) -> TermLineResult<()> {
        self.raw.open().await
    }

    /// Close the transport, flushing any in-progress lines first
    pub async fn close(&self) -> TermLineResult<()> {
        self.engine.flush(Direction::Tx);
        self.engine.flush(Direction::Rx);
        self.raw.close().await
    }

    pub async fn send(&self, data: Vec<u8>) -> TermLineResult<()> {
        self.raw.send(data).await
    }

    pub async fn clear_repository(&self, kind: RepositoryKind) -> TermLineResult<()> {
        self.raw.clear_repository(kind).await?;
        // The line view is recomputed from what remains
        self.reload_lines().await;
        Ok(())
    }

    pub async fn repository_to_elements(&self, kind: RepositoryKind) -> Vec<Arc<RawElement>> {
        self.raw.repository_to_elements(kind).await
    }

    /// Completed display lines of one direction, oldest first
    pub async fn lines(&self, direction: Direction) -> Vec<DisplayLine> {
        self.engine.lines(direction).await
    }

    pub fn is_open(&self) -> bool {
        self.raw.is_open()
    }

    pub async fn is_connected(&self) -> bool {
        self.raw.is_connected().await
    }

    pub async fn bytes_available(&self) -> usize {
        self.raw.bytes_available().await
    }

    /// Apply new repository capacities and recompute the line view
    pub async fn set_buffer_config(&self, buffers: &BufferConfig) {
        self.raw.set_buffer_config(buffers).await;
        self.reload_lines().await;
    }

    /// Apply new line break / display / mode settings and recompute the
    /// line view
    pub async fn set_line_settings(
        &self,
        line_break: LineBreakConfig,
        display: DisplayConfig,
        mode: TerminalMode,
        history_limit: usize,
    ) {
        self.engine.apply_settings(LineSettings {
            line_break,
            display,
            mode,
            history_limit,
        });
        self.reload_lines().await;
    }

    /// Replace the transport; an open terminal closes and reopens
    pub async fn set_transport_config(&self, config: &TransportConfig) -> TermLineResult<()> {
        self.raw.set_transport_config(config).await
    }

    /// Recompute line history deterministically from the bidirectional
    /// repository
    pub async fn reload_lines(&self) {
        let elements = self.raw.repository_to_elements(RepositoryKind::Bidir).await;
        debug!(terminal = %self.id, "Recomputing lines from {} elements", elements.len());
        self.engine.reload(elements);
    }

    /// Tear the terminal down; later operations fail with `Disposed`
    pub async fn dispose(&self) -> TermLineResult<()> {
        self.raw.dispose().await?;
        self.engine.shutdown();
        for handle in &self.forward_handles {
            handle.abort();
        }
        info!(terminal = %self.id, "Terminal disposed");
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        for handle in &self.forward_handles {
            handle.abort();
        }
    }
}

async fn publish_to(subscribers: &Subscribers, event: TerminalEvent) {
    let senders: Vec<_> = subscribers.lock().await.iter().cloned().collect();
    for sender in senders {
        let _ = sender.send(event.clone());
    }
}

fn line_settings(config: &TerminalConfig, global: &GlobalConfig) -> LineSettings {
    LineSettings {
        line_break: config.line_break.clone(),
        display: config.display.clone(),
        mode: config.mode.clone(),
        history_limit: global.history_limit,
    }
}
