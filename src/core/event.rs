use crate::core::line::display::{DisplayElement, DisplayLine};
use crate::core::raw::element::{Direction, RawElement};
use crate::core::raw::repository::RepositoryKind;
use std::sync::Arc;

/// Event published by a terminal to its subscribers (GUI, log, tests).
///
/// Publication happens from the terminal's own tasks; no internal lock is
/// held while a subscriber channel is written.
#[derive(Debug, Clone)]
pub enum TerminalEvent {
    /// Transport opened
    Opened,
    /// Transport closed
    Closed,
    /// Connection status or topology changed
    Changed,
    /// Control-line or flow state changed
    ControlChanged,
    /// Transport fault, payload is the original message
    Error(String),
    /// A tx element was captured
    RawElementSent(Arc<RawElement>),
    /// An rx element was captured
    RawElementReceived(Arc<RawElement>),
    /// The named repository was truncated
    RepositoryCleared(RepositoryKind),
    /// Display elements were appended to the in-progress line
    DisplayElementsProcessed {
        direction: Direction,
        elements: Vec<DisplayElement>,
    },
    /// Lines were completed
    DisplayLinesProcessed {
        direction: Direction,
        lines: Vec<DisplayLine>,
    },
}
