use crate::core::line::display::DisplayElement;
use crate::core::raw::element::Direction;
use std::time::SystemTime;

/// Position of one direction's line state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePosition {
    Begin,
    Data,
    End,
}

/// Mutable per-direction line assembly state.
///
/// Owned exclusively by the engine's serialization task; reset to `Begin`
/// after each completed line.
pub struct LineState {
    pub position: LinePosition,
    /// Elements of the line built so far
    pub elements: Vec<DisplayElement>,
    /// Data elements among them
    pub data_count: usize,
    /// Timestamp of the line's first atom
    pub started_at: Option<SystemTime>,
    /// Monotonic guard: a timed-break message carrying an older generation
    /// is stale and ignored
    pub timer_generation: u64,
    /// Currently scheduled break timer, aborted on restart and completion
    pub timer_handle: Option<tokio::task::JoinHandle<()>>,
}

impl LineState {
    pub fn new() -> Self {
        Self {
            position: LinePosition::Begin,
            elements: Vec::new(),
            data_count: 0,
            started_at: None,
            timer_generation: 0,
            timer_handle: None,
        }
    }

    pub fn push(&mut self, element: DisplayElement) {
        if element.is_data() {
            self.data_count += 1;
        }
        self.elements.push(element);
    }

    /// Whether a line is being built (at least one element accumulated)
    pub fn in_progress(&self) -> bool {
        !self.elements.is_empty()
    }

    /// Take the accumulated elements and return to `Begin`
    pub fn reset(&mut self) -> Vec<DisplayElement> {
        self.position = LinePosition::Begin;
        self.data_count = 0;
        self.started_at = None;
        std::mem::take(&mut self.elements)
    }

    /// Cancel any scheduled break timer
    pub fn stop_timer(&mut self) {
        self.timer_generation += 1;
        if let Some(handle) = self.timer_handle.take() {
            handle.abort();
        }
    }
}

impl Default for LineState {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LineState {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

/// Session-wide interleave tracking, used only by the direction line break
/// rule.
pub struct BidirLineState {
    /// Whether any line of this session has started yet
    pub any_line_seen: bool,
    /// Direction of the most recently active line
    pub active_direction: Direction,
}

impl BidirLineState {
    pub fn new() -> Self {
        Self {
            any_line_seen: false,
            active_direction: Direction::Tx,
        }
    }

    /// Record activity and report whether the other direction's line must be
    /// force-closed first. The very first line of a session is exempt.
    pub fn on_activity(&mut self, direction: Direction, enabled: bool) -> bool {
        let force_close =
            enabled && self.any_line_seen && self.active_direction != direction;
        self.any_line_seen = true;
        self.active_direction = direction;
        force_close
    }
}

impl Default for BidirLineState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_state_accumulation() {
        let mut state = LineState::new();
        state.push(DisplayElement::TxData("41".to_string()));
        state.push(DisplayElement::Space);
        state.push(DisplayElement::TxData("42".to_string()));

        assert!(state.in_progress());
        assert_eq!(state.data_count, 2);

        let elements = state.reset();
        assert_eq!(elements.len(), 3);
        assert!(!state.in_progress());
        assert_eq!(state.data_count, 0);
        assert_eq!(state.position, LinePosition::Begin);
    }

    #[test]
    fn test_first_line_exempt_from_direction_break() {
        let mut bidir = BidirLineState::new();
        // First activity never forces a close, regardless of direction
        assert!(!bidir.on_activity(Direction::Rx, true));
        // Direction change afterwards does
        assert!(bidir.on_activity(Direction::Tx, true));
        // Same direction does not
        assert!(!bidir.on_activity(Direction::Tx, true));
    }

    #[test]
    fn test_direction_break_disabled() {
        let mut bidir = BidirLineState::new();
        assert!(!bidir.on_activity(Direction::Tx, false));
        assert!(!bidir.on_activity(Direction::Rx, false));
    }
}
