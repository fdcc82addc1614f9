use crate::core::event::TerminalEvent;
use crate::core::line::display::{DisplayElement, DisplayLine};
use crate::core::line::processor::{create_processor, Atom, LineProcessor};
use crate::core::line::state::{BidirLineState, LinePosition, LineState};
use crate::core::raw::element::{Direction, RawElement};
use crate::domain::config::{DisplayConfig, LineBreakConfig, TerminalMode};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Snapshot of everything the engine needs from configuration
#[derive(Debug, Clone)]
pub struct LineSettings {
    pub line_break: LineBreakConfig,
    pub display: DisplayConfig,
    pub mode: TerminalMode,
    pub history_limit: usize,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            line_break: LineBreakConfig::default(),
            display: DisplayConfig::default(),
            mode: TerminalMode::default(),
            history_limit: 1000,
        }
    }
}

enum EngineMsg {
    Raw(Arc<RawElement>),
    TimedBreak { direction: Direction, generation: u64 },
    Reload(Vec<Arc<RawElement>>),
    Flush(Direction),
    Settings(LineSettings),
    Shutdown,
}

struct Histories {
    tx: VecDeque<DisplayLine>,
    rx: VecDeque<DisplayLine>,
    limit: usize,
}

impl Histories {
    fn new(limit: usize) -> Self {
        Self {
            tx: VecDeque::new(),
            rx: VecDeque::new(),
            limit,
        }
    }

    fn get_mut(&mut self, direction: Direction) -> &mut VecDeque<DisplayLine> {
        match direction {
            Direction::Tx => &mut self.tx,
            Direction::Rx => &mut self.rx,
        }
    }

    fn append(&mut self, direction: Direction, lines: &[DisplayLine]) {
        let limit = self.limit;
        let history = self.get_mut(direction);
        for line in lines {
            history.push_back(line.clone());
        }
        while history.len() > limit {
            history.pop_front();
        }
    }

    fn clear(&mut self) {
        self.tx.clear();
        self.rx.clear();
    }
}

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<TerminalEvent>>>>;

/// Converts raw elements into display lines under the configured break
/// policies.
///
/// All line state lives on one serialization task fed through an internal
/// channel; break timers post back into the same channel, so no state is
/// ever touched from two tasks.
pub struct LineEngine {
    cmd_tx: mpsc::UnboundedSender<EngineMsg>,
    subscribers: Subscribers,
    histories: Arc<Mutex<Histories>>,
    worker_handle: tokio::task::JoinHandle<()>,
}

impl LineEngine {
    pub fn new(settings: LineSettings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));
        let histories = Arc::new(Mutex::new(Histories::new(settings.history_limit)));

        let worker = Worker::new(
            settings,
            cmd_tx.clone(),
            Arc::clone(&subscribers),
            Arc::clone(&histories),
        );
        let worker_handle = tokio::spawn(worker.run(cmd_rx));

        Self {
            cmd_tx,
            subscribers,
            histories,
            worker_handle,
        }
    }

    /// Register a new event subscriber
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<TerminalEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().await.push(tx);
        rx
    }

    /// Feed one raw element into the state machine
    pub fn process(&self, element: Arc<RawElement>) {
        let _ = self.cmd_tx.send(EngineMsg::Raw(element));
    }

    /// Recompute the whole line history from stored elements. Timed breaks
    /// are derived from the stored timestamps instead of live timers.
    pub fn reload(&self, elements: Vec<Arc<RawElement>>) {
        let _ = self.cmd_tx.send(EngineMsg::Reload(elements));
    }

    /// Force-close the in-progress line of one direction, if any. Used on
    /// terminal close so partial traffic is not lost.
    pub fn flush(&self, direction: Direction) {
        let _ = self.cmd_tx.send(EngineMsg::Flush(direction));
    }

    /// Swap the settings snapshot. Callers follow up with [`reload`] to
    /// apply them to history.
    ///
    /// [`reload`]: LineEngine::reload
    pub fn apply_settings(&self, settings: LineSettings) {
        let _ = self.cmd_tx.send(EngineMsg::Settings(settings));
    }

    /// Completed lines of one direction, oldest first
    pub async fn lines(&self, direction: Direction) -> Vec<DisplayLine> {
        let mut histories = self.histories.lock().await;
        histories.get_mut(direction).iter().cloned().collect()
    }

    /// Stop the serialization task and all break timers
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(EngineMsg::Shutdown);
    }
}

impl Drop for LineEngine {
    fn drop(&mut self) {
        self.worker_handle.abort();
    }
}

struct Worker {
    settings: LineSettings,
    tx_state: LineState,
    rx_state: LineState,
    tx_processor: Box<dyn LineProcessor>,
    rx_processor: Box<dyn LineProcessor>,
    bidir: BidirLineState,
    /// Per-direction timestamp of the last processed element, used for
    /// deterministic timed breaks during reload
    last_seen: [Option<SystemTime>; 2],
    cmd_tx: mpsc::UnboundedSender<EngineMsg>,
    subscribers: Subscribers,
    histories: Arc<Mutex<Histories>>,
}

fn index(direction: Direction) -> usize {
    match direction {
        Direction::Tx => 0,
        Direction::Rx => 1,
    }
}

impl Worker {
    fn new(
        settings: LineSettings,
        cmd_tx: mpsc::UnboundedSender<EngineMsg>,
        subscribers: Subscribers,
        histories: Arc<Mutex<Histories>>,
    ) -> Self {
        let tx_processor = create_processor(&settings.mode);
        let rx_processor = create_processor(&settings.mode);
        Self {
            settings,
            tx_state: LineState::new(),
            rx_state: LineState::new(),
            tx_processor,
            rx_processor,
            bidir: BidirLineState::new(),
            last_seen: [None, None],
            cmd_tx,
            subscribers,
            histories,
        }
    }

    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<EngineMsg>) {
        while let Some(msg) = cmd_rx.recv().await {
            match msg {
                EngineMsg::Raw(element) => {
                    self.handle_raw(&element, true).await;
                }
                EngineMsg::TimedBreak {
                    direction,
                    generation,
                } => {
                    self.handle_timed_break(direction, generation).await;
                }
                EngineMsg::Reload(elements) => {
                    self.handle_reload(elements).await;
                }
                EngineMsg::Flush(direction) => {
                    if self.state_mut(direction).in_progress() {
                        self.force_end(direction).await;
                    }
                }
                EngineMsg::Settings(settings) => {
                    self.handle_settings(settings).await;
                }
                EngineMsg::Shutdown => break,
            }
        }
        self.tx_state.stop_timer();
        self.rx_state.stop_timer();
    }

    fn state_mut(&mut self, direction: Direction) -> &mut LineState {
        match direction {
            Direction::Tx => &mut self.tx_state,
            Direction::Rx => &mut self.rx_state,
        }
    }

    async fn handle_raw(&mut self, element: &RawElement, live: bool) {
        let direction = element.direction;

        // Reload derives timed breaks from stored timestamps
        if !live && self.settings.line_break.timed.enabled {
            let timeout = Duration::from_millis(self.settings.line_break.timed.timeout_ms);
            if let Some(last) = self.last_seen[index(direction)] {
                let gap = element
                    .timestamp
                    .duration_since(last)
                    .unwrap_or(Duration::ZERO);
                if gap >= timeout && self.state_mut(direction).in_progress() {
                    self.force_end(direction).await;
                }
            }
        }
        self.last_seen[index(direction)] = Some(element.timestamp);

        // Direction line break, exempting the session's first line
        let enabled = self.settings.line_break.direction_enabled;
        if self.bidir.on_activity(direction, enabled)
            && self.state_mut(direction.opposite()).in_progress()
        {
            self.force_end(direction.opposite()).await;
        }

        let atoms = match direction {
            Direction::Tx => self.tx_processor.tokenize(&element.data),
            Direction::Rx => self.rx_processor.tokenize(&element.data),
        };

        let mut new_elements = Vec::new();
        let mut new_lines = Vec::new();

        for atom in atoms {
            self.process_atom(
                direction,
                atom,
                element.timestamp,
                live,
                &mut new_elements,
                &mut new_lines,
            );
        }

        if !new_elements.is_empty() {
            self.publish(TerminalEvent::DisplayElementsProcessed {
                direction,
                elements: new_elements,
            })
            .await;
        }
        if !new_lines.is_empty() {
            self.histories.lock().await.append(direction, &new_lines);
            self.publish(TerminalEvent::DisplayLinesProcessed {
                direction,
                lines: new_lines,
            })
            .await;
        }
    }

    fn process_atom(
        &mut self,
        direction: Direction,
        atom: Atom,
        timestamp: SystemTime,
        live: bool,
        new_elements: &mut Vec<DisplayElement>,
        new_lines: &mut Vec<DisplayLine>,
    ) {
        if self.state_mut(direction).position == LinePosition::Begin {
            self.begin_line(direction, timestamp, live, new_elements);
        }

        match atom {
            Atom::Eol => {
                self.end_line(direction, new_elements, new_lines);
            }
            Atom::Data(text) => {
                let spaced = match direction {
                    Direction::Tx => self.tx_processor.spaced(),
                    Direction::Rx => self.rx_processor.spaced(),
                };
                let state = self.state_mut(direction);
                if spaced && state.elements.last().map(|e| e.is_data()).unwrap_or(false) {
                    state.push(DisplayElement::Space);
                    new_elements.push(DisplayElement::Space);
                }

                let element = match direction {
                    Direction::Tx => DisplayElement::TxData(text),
                    Direction::Rx => DisplayElement::RxData(text),
                };
                let state = self.state_mut(direction);
                state.push(element.clone());
                new_elements.push(element);

                if live {
                    self.restart_timer(direction);
                }

                let length_enabled = self.settings.line_break.length.enabled;
                let max_length = self.settings.line_break.length.max_length;
                if length_enabled && self.state_mut(direction).data_count >= max_length {
                    self.end_line(direction, new_elements, new_lines);
                }
            }
            Atom::Control(text) => {
                let element = match direction {
                    Direction::Tx => DisplayElement::TxControl(text),
                    Direction::Rx => DisplayElement::RxControl(text),
                };
                self.state_mut(direction).push(element.clone());
                new_elements.push(element);

                if live {
                    self.restart_timer(direction);
                }
            }
        }
    }

    fn begin_line(
        &mut self,
        direction: Direction,
        timestamp: SystemTime,
        live: bool,
        new_elements: &mut Vec<DisplayElement>,
    ) {
        let show_timestamp = self.settings.display.show_timestamp;
        let state = self.state_mut(direction);

        if show_timestamp {
            let rendered = format_timestamp(timestamp);
            for element in [DisplayElement::TimeStamp(rendered), DisplayElement::LeftMargin] {
                state.push(element.clone());
                new_elements.push(element);
            }
        }
        state.started_at = Some(timestamp);
        state.position = LinePosition::Data;

        if live {
            self.restart_timer(direction);
        }
    }

    /// End sequence: stop the timer, optionally append the length suffix,
    /// terminate with exactly one LineBreak, flush and reset to Begin.
    fn end_line(
        &mut self,
        direction: Direction,
        new_elements: &mut Vec<DisplayElement>,
        new_lines: &mut Vec<DisplayLine>,
    ) {
        let show_length = self.settings.display.show_length;
        let state = self.state_mut(direction);
        state.position = LinePosition::End;
        state.stop_timer();

        if show_length {
            for element in [
                DisplayElement::RightMargin,
                DisplayElement::LineLength(state.data_count),
            ] {
                state.push(element.clone());
                new_elements.push(element);
            }
        }
        state.push(DisplayElement::LineBreak);
        new_elements.push(DisplayElement::LineBreak);

        let line = DisplayLine::new(state.reset());
        debug!(
            "Completed {} line with {} data elements",
            direction,
            line.data_count()
        );
        new_lines.push(line);
    }

    /// Force-close an in-progress line outside the per-atom loop (timed or
    /// direction break), publishing its events directly.
    async fn force_end(&mut self, direction: Direction) {
        let mut new_elements = Vec::new();
        let mut new_lines = Vec::new();
        self.end_line(direction, &mut new_elements, &mut new_lines);

        self.histories.lock().await.append(direction, &new_lines);
        self.publish(TerminalEvent::DisplayElementsProcessed {
            direction,
            elements: new_elements,
        })
        .await;
        self.publish(TerminalEvent::DisplayLinesProcessed {
            direction,
            lines: new_lines,
        })
        .await;
    }

    async fn handle_timed_break(&mut self, direction: Direction, generation: u64) {
        let state = self.state_mut(direction);
        if state.timer_generation != generation {
            // Raced with a restart or completion, stale fire
            return;
        }
        if !state.in_progress() {
            return;
        }
        debug!("Timed line break fired for {}", direction);
        self.force_end(direction).await;
    }

    /// Restart the inactivity timer: cancel the scheduled fire and schedule
    /// a fresh one carrying the new generation.
    fn restart_timer(&mut self, direction: Direction) {
        let timed = self.settings.line_break.timed.clone();
        if !timed.enabled {
            return;
        }

        let cmd_tx = self.cmd_tx.clone();
        let state = self.state_mut(direction);
        state.stop_timer();
        let generation = state.timer_generation;
        let timeout = Duration::from_millis(timed.timeout_ms);

        state.timer_handle = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = cmd_tx.send(EngineMsg::TimedBreak {
                direction,
                generation,
            });
        }));
    }

    async fn handle_reload(&mut self, elements: Vec<Arc<RawElement>>) {
        debug!("Reloading line history from {} elements", elements.len());

        self.tx_state.stop_timer();
        self.rx_state.stop_timer();
        self.tx_state.reset();
        self.rx_state.reset();
        self.tx_processor.reset();
        self.rx_processor.reset();
        self.bidir = BidirLineState::new();
        self.last_seen = [None, None];
        self.histories.lock().await.clear();

        for element in &elements {
            self.handle_raw(element, false).await;
        }
    }

    async fn handle_settings(&mut self, settings: LineSettings) {
        self.tx_state.stop_timer();
        self.rx_state.stop_timer();
        self.tx_processor = create_processor(&settings.mode);
        self.rx_processor = create_processor(&settings.mode);
        self.histories.lock().await.limit = settings.history_limit;
        self.settings = settings;
    }

    async fn publish(&self, event: TerminalEvent) {
        let senders: Vec<_> = self.subscribers.lock().await.iter().cloned().collect();
        for sender in senders {
            if sender.send(event.clone()).is_err() {
                warn!("Dropping event for closed subscriber");
            }
        }
    }
}

fn format_timestamp(timestamp: SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Local> = timestamp.into();
    datetime.format("(%H:%M:%S%.3f)").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{LengthLineBreak, TimedLineBreak};
    use std::time::Duration;

    fn binary_settings(line_break: LineBreakConfig) -> LineSettings {
        LineSettings {
            line_break,
            display: DisplayConfig::default(),
            mode: TerminalMode::Binary,
            history_limit: 100,
        }
    }

    fn element(direction: Direction, data: &[u8]) -> Arc<RawElement> {
        Arc::new(RawElement::new(data.to_vec(), direction))
    }

    async fn settle(engine: &LineEngine) {
        // The worker drains its channel in order; a short yield is enough
        // for inline processing without timers.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = engine;
    }

    #[tokio::test]
    async fn test_length_break_exactness() {
        let engine = LineEngine::new(binary_settings(LineBreakConfig {
            length: LengthLineBreak {
                enabled: true,
                max_length: 4,
            },
            ..LineBreakConfig::default()
        }));

        engine.process(element(Direction::Tx, &[0u8; 9]));
        settle(&engine).await;

        // The ninth byte has not completed a line yet
        let lines = engine.lines(Direction::Tx).await;
        let counts: Vec<usize> = lines.iter().map(|l| l.data_count()).collect();
        assert_eq!(counts, vec![4, 4]);

        engine.flush(Direction::Tx);
        settle(&engine).await;

        let lines = engine.lines(Direction::Tx).await;
        let counts: Vec<usize> = lines.iter().map(|l| l.data_count()).collect();
        assert_eq!(counts, vec![4, 4, 1]);
    }

    #[tokio::test]
    async fn test_every_line_has_exactly_one_trailing_break() {
        let engine = LineEngine::new(binary_settings(LineBreakConfig {
            length: LengthLineBreak {
                enabled: true,
                max_length: 2,
            },
            ..LineBreakConfig::default()
        }));

        engine.process(element(Direction::Rx, &[1, 2, 3, 4, 5, 6]));
        settle(&engine).await;

        let lines = engine.lines(Direction::Rx).await;
        assert_eq!(lines.len(), 3);
        for line in lines {
            let breaks = line
                .elements
                .iter()
                .filter(|e| **e == DisplayElement::LineBreak)
                .count();
            assert_eq!(breaks, 1);
            assert_eq!(line.elements.last(), Some(&DisplayElement::LineBreak));
        }
    }

    #[tokio::test]
    async fn test_binary_data_elements_are_spaced() {
        let engine = LineEngine::new(binary_settings(LineBreakConfig {
            length: LengthLineBreak {
                enabled: true,
                max_length: 3,
            },
            ..LineBreakConfig::default()
        }));

        engine.process(element(Direction::Tx, &[0x41, 0x42, 0x43]));
        settle(&engine).await;

        let lines = engine.lines(Direction::Tx).await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "41 42 43");
    }

    #[tokio::test]
    async fn test_timed_break_fires_on_inactivity() {
        let engine = LineEngine::new(binary_settings(LineBreakConfig {
            timed: TimedLineBreak {
                enabled: true,
                timeout_ms: 50,
            },
            ..LineBreakConfig::default()
        }));
        let mut events = engine.subscribe().await;

        engine.process(element(Direction::Rx, &[1, 2]));
        tokio::time::sleep(Duration::from_millis(150)).await;

        let lines = engine.lines(Direction::Rx).await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].data_count(), 2);

        let mut saw_lines_event = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, TerminalEvent::DisplayLinesProcessed { .. }) {
                saw_lines_event = true;
            }
        }
        assert!(saw_lines_event);
    }

    #[tokio::test]
    async fn test_timer_restarts_on_activity() {
        let engine = LineEngine::new(binary_settings(LineBreakConfig {
            timed: TimedLineBreak {
                enabled: true,
                timeout_ms: 80,
            },
            ..LineBreakConfig::default()
        }));

        // Keep feeding within the timeout window; no break may fire
        for _ in 0..4 {
            engine.process(element(Direction::Tx, &[0x41]));
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        assert!(engine.lines(Direction::Tx).await.is_empty());

        // Now go quiet and let it fire
        tokio::time::sleep(Duration::from_millis(200)).await;
        let lines = engine.lines(Direction::Tx).await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].data_count(), 4);
    }

    #[tokio::test]
    async fn test_direction_break_skips_first_line() {
        let engine = LineEngine::new(binary_settings(LineBreakConfig {
            direction_enabled: true,
            ..LineBreakConfig::default()
        }));

        // The very first element of the session never force-closes anything
        engine.process(element(Direction::Tx, b"A"));
        settle(&engine).await;
        assert!(engine.lines(Direction::Tx).await.is_empty());
        assert!(engine.lines(Direction::Rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_direction_break_closes_other_line() {
        let engine = LineEngine::new(binary_settings(LineBreakConfig {
            direction_enabled: true,
            ..LineBreakConfig::default()
        }));

        engine.process(element(Direction::Tx, b"A"));
        engine.process(element(Direction::Rx, b"B"));
        engine.process(element(Direction::Tx, b"C"));
        settle(&engine).await;

        // Rx arriving after Tx closed the Tx "A" line; Tx "C" then closed
        // the Rx "B" line.
        let tx_lines = engine.lines(Direction::Tx).await;
        assert_eq!(tx_lines.len(), 1);
        assert_eq!(tx_lines[0].data_count(), 1);
        assert_eq!(tx_lines[0].text(), "41");

        let rx_lines = engine.lines(Direction::Rx).await;
        assert_eq!(rx_lines.len(), 1);
        assert_eq!(rx_lines[0].text(), "42");
    }

    #[tokio::test]
    async fn test_text_mode_eol_completes_line() {
        let engine = LineEngine::new(LineSettings {
            mode: TerminalMode::Text {
                eol: "\n".to_string(),
            },
            ..LineSettings::default()
        });

        engine.process(element(Direction::Tx, b"A\n"));
        settle(&engine).await;

        let lines = engine.lines(Direction::Tx).await;
        assert_eq!(lines.len(), 1);
        // 1 data element + 1 line break, nothing else with default toggles
        assert_eq!(lines[0].elements.len(), 2);
        assert_eq!(lines[0].data_count(), 1);
        assert_eq!(
            lines[0].elements,
            vec![
                DisplayElement::TxData("A".to_string()),
                DisplayElement::LineBreak,
            ]
        );
    }

    #[tokio::test]
    async fn test_show_length_suffix_and_timestamp_prefix() {
        let engine = LineEngine::new(LineSettings {
            display: DisplayConfig {
                show_timestamp: true,
                show_length: true,
            },
            mode: TerminalMode::Text {
                eol: "\n".to_string(),
            },
            ..LineSettings::default()
        });

        engine.process(element(Direction::Rx, b"AB\n"));
        settle(&engine).await;

        let lines = engine.lines(Direction::Rx).await;
        assert_eq!(lines.len(), 1);
        let elements = &lines[0].elements;
        assert!(matches!(elements[0], DisplayElement::TimeStamp(_)));
        assert_eq!(elements[1], DisplayElement::LeftMargin);
        assert_eq!(elements[elements.len() - 3], DisplayElement::RightMargin);
        assert_eq!(elements[elements.len() - 2], DisplayElement::LineLength(2));
        assert_eq!(elements[elements.len() - 1], DisplayElement::LineBreak);
    }

    #[tokio::test]
    async fn test_reload_reproduces_timed_breaks() {
        let settings = binary_settings(LineBreakConfig {
            timed: TimedLineBreak {
                enabled: true,
                timeout_ms: 100,
            },
            ..LineBreakConfig::default()
        });

        // Stored elements whose timestamps are further apart than the
        // timeout must split deterministically on reload.
        let base = SystemTime::now();
        let stored = vec![
            Arc::new(RawElement::with_timestamp(vec![1], Direction::Rx, base)),
            Arc::new(RawElement::with_timestamp(
                vec![2],
                Direction::Rx,
                base + Duration::from_millis(30),
            )),
            Arc::new(RawElement::with_timestamp(
                vec![3],
                Direction::Rx,
                base + Duration::from_millis(500),
            )),
        ];

        let engine = LineEngine::new(settings);
        engine.reload(stored);
        settle(&engine).await;

        let lines = engine.lines(Direction::Rx).await;
        // Elements 1 and 2 form the first line; the 500 ms gap breaks
        // before element 3, which stays in progress.
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].data_count(), 2);
    }

    #[tokio::test]
    async fn test_reload_is_idempotent() {
        let settings = binary_settings(LineBreakConfig {
            length: LengthLineBreak {
                enabled: true,
                max_length: 2,
            },
            ..LineBreakConfig::default()
        });

        let base = SystemTime::now();
        let stored: Vec<_> = (0..5u8)
            .map(|i| {
                Arc::new(RawElement::with_timestamp(
                    vec![i],
                    Direction::Tx,
                    base + Duration::from_millis(u64::from(i)),
                ))
            })
            .collect();

        let engine = LineEngine::new(settings);
        engine.reload(stored.clone());
        settle(&engine).await;
        let first = engine.lines(Direction::Tx).await;

        engine.reload(stored);
        settle(&engine).await;
        let second = engine.lines(Direction::Tx).await;

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
