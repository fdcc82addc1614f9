use crate::core::raw::element::RawElement;
use std::collections::VecDeque;
use std::sync::Arc;

/// Selector for one of the three raw repositories of a terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryKind {
    Tx,
    Rx,
    Bidir,
}

impl std::fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryKind::Tx => write!(f, "tx"),
            RepositoryKind::Rx => write!(f, "rx"),
            RepositoryKind::Bidir => write!(f, "bidir"),
        }
    }
}

/// Ordered, capacity-bounded sequence of raw elements.
///
/// The oldest element is evicted when the capacity is exceeded. Shrinking
/// the capacity at runtime trims from the front so the newest elements
/// survive.
#[derive(Debug)]
pub struct RawRepository {
    elements: VecDeque<Arc<RawElement>>,
    capacity: usize,
}

impl RawRepository {
    pub fn new(capacity: usize) -> Self {
        Self {
            elements: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append an element, evicting from the front if the bound is reached
    pub fn push(&mut self, element: Arc<RawElement>) {
        if self.capacity == 0 {
            return;
        }
        while self.elements.len() >= self.capacity {
            self.elements.pop_front();
        }
        self.elements.push_back(element);
    }

    /// Change the bound and re-trim immediately, keeping the newest elements
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.elements.len() > self.capacity {
            self.elements.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Snapshot of the contents in arrival order
    pub fn to_elements(&self) -> Vec<Arc<RawElement>> {
        self.elements.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
