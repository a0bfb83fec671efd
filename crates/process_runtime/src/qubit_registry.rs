// =============================================================================
// Quantum Process Runtime - Qubit Registry
// =============================================================================
// Table of Contents:
//   1. QubitRegistry - Per-process qubit index table
// =============================================================================
// Purpose: Per-process table of qubit indices and their allocation status.
//          The index space grows monotonically; freed indices are never
//          reused. The engine remains authoritative for status queries; the
//          registry mirrors status for introspection and tracks the
//          simultaneous-allocation high-water mark.
// =============================================================================

use engine_interface::contract::{QubitId, QubitStatus};

// =============================================================================
// 1. QubitRegistry
// =============================================================================

#[derive(Debug, Default)]
pub struct QubitRegistry {
    statuses: Vec<QubitStatus>,
    allocated_count: usize,
    simultaneous_high_water: usize,
}

impl QubitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly engine-allocated qubit. Engine indices are expected
    /// to arrive in monotonic order.
    pub fn record_allocation(&mut self, qubit: QubitId) {
        if qubit.index() >= self.statuses.len() {
            self.statuses.resize(qubit.index() + 1, QubitStatus::Free);
        }
        self.statuses[qubit.index()] = QubitStatus::Allocated;
        self.allocated_count += 1;
        self.simultaneous_high_water = self.simultaneous_high_water.max(self.allocated_count);
    }

    pub fn record_release(&mut self, qubit: QubitId) {
        if let Some(status) = self.statuses.get_mut(qubit.index()) {
            if *status == QubitStatus::Allocated {
                *status = QubitStatus::Free;
                self.allocated_count -= 1;
            }
        }
    }

    pub fn status(&self, qubit: QubitId) -> Option<QubitStatus> {
        self.statuses.get(qubit.index()).copied()
    }

    pub fn contains(&self, qubit: QubitId) -> bool {
        qubit.index() < self.statuses.len()
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Total number of indices ever handed out.
    pub fn issued_count(&self) -> usize {
        self.statuses.len()
    }

    pub fn simultaneous_high_water(&self) -> usize {
        self.simultaneous_high_water
    }
}
