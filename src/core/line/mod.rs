// Line module - Byte-to-display-line framing
pub mod display;
pub mod engine;
pub mod processor;
pub mod state;

pub use display::{DisplayElement, DisplayLine};
pub use engine::{LineEngine, LineSettings};
pub use processor::LineProcessor;
