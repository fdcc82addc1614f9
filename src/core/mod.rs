// Core module - Transport contract, raw capture and line framing
pub mod event;
pub mod line;
pub mod raw;
pub mod terminal;
pub mod transport;

pub use event::TerminalEvent;
pub use terminal::Terminal;
pub use transport::{Transport, TransportEvent, TransportKind};
