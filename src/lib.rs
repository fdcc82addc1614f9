//! TermLine Library
//!
//! Terminal communication core providing serial, TCP, UDP and
//! auto-negotiated socket transports with raw byte capture and
//! byte-to-display-line framing.

pub mod core;
pub mod domain;
pub mod infrastructure;

pub use domain::error::{TermLineError, TermLineResult};
pub use domain::config::{TermLineConfig, TerminalConfig, TransportConfig};
pub use core::event::TerminalEvent;
pub use core::line::{DisplayElement, DisplayLine, LineSettings};
pub use core::raw::{Direction, RawElement, RepositoryKind};
pub use core::terminal::Terminal;
pub use core::transport::{Transport, TransportEvent, TransportKind};
