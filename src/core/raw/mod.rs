// Raw module - Byte capture and bounded repositories
pub mod element;
pub mod repository;
pub mod terminal;

pub use element::{Direction, RawElement};
pub use repository::{RawRepository, RepositoryKind};
pub use terminal::RawTerminal;
