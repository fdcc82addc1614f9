use std::time::SystemTime;

/// Traffic direction as seen from this terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Tx,
    Rx,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Tx => Direction::Rx,
            Direction::Rx => Direction::Tx,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Tx => write!(f, "tx"),
            Direction::Rx => write!(f, "rx"),
        }
    }
}

/// One time-stamped, direction-tagged chunk of raw bytes as it crossed the
/// transport boundary. Created once per send or drained receive, never
/// mutated afterwards; shared between the per-direction and bidirectional
/// repositories through `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawElement {
    pub data: Vec<u8>,
    pub direction: Direction,
    pub timestamp: SystemTime,
}

impl RawElement {
    pub fn new(data: Vec<u8>, direction: Direction) -> Self {
        Self {
            data,
            direction,
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_timestamp(data: Vec<u8>, direction: Direction, timestamp: SystemTime) -> Self {
        Self {
            data,
            direction,
            timestamp,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
