use std::sync::atomic::{AtomicBool, Ordering};

/// Shared mark table for the sieve, one cell per number in `0..=limit`.
///
/// A cell only ever moves from clear to marked, and during the marking phase
/// each worker strikes only the multiples of seeds it personally dequeued,
/// so no two threads store to the same cell. All accesses are `Relaxed`: the
/// ordering between the marking phase and the scanning phase comes from the
/// pool barrier, not from the cells themselves.
pub struct CompositeTable {
    cells: Vec<AtomicBool>,
}

impl CompositeTable {
    pub fn new(limit: u32) -> Self {
        let mut cells = Vec::new();
        cells.resize_with(limit as usize + 1, AtomicBool::default);
        CompositeTable { cells }
    }

    pub fn limit(&self) -> u32 {
        (self.cells.len() - 1) as u32
    }

    pub fn mark_composite(&self, n: u32) {
        self.cells[n as usize].store(true, Ordering::Relaxed);
    }

    pub fn is_composite(&self, n: u32) -> bool {
        self.cells[n as usize].load(Ordering::Relaxed)
    }
}
