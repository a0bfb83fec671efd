// =============================================================================
// Quantum Process Runtime - Qubit Group
// =============================================================================
// Table of Contents:
//   1. QubitGroup - Ordered, sliceable, concatenable qubit handle
//   2. Gate issuance - Opaque gate application through the process
//   3. Lifecycle - free / is_free / scoped
// =============================================================================
// Purpose: The unit quantum operations act upon: an ordered sequence of
//          qubit indices with a checked weak back-reference to the owning
//          process. Slicing, selection, concatenation, and reversal all
//          produce new groups and preserve order.
// =============================================================================

use std::ops::Range;

use uuid::Uuid;

use engine_interface::contract::{QubitId, QubitStatus};
use engine_interface::instruction::GateKind;

use crate::error::{RuntimeError, RuntimeResult};
use crate::process::{upgrade_core, WeakProcessCore};

// =============================================================================
// 1. QubitGroup
// =============================================================================

#[derive(Debug, Clone)]
pub struct QubitGroup {
    core: WeakProcessCore,
    process_id: Uuid,
    qubits: Vec<QubitId>,
}

impl QubitGroup {
    pub(crate) fn from_parts(
        core: WeakProcessCore,
        process_id: Uuid,
        qubits: Vec<QubitId>,
    ) -> Self {
        Self {
            core,
            process_id,
            qubits,
        }
    }

    fn derived(&self, qubits: Vec<QubitId>) -> Self {
        Self {
            core: self.core.clone(),
            process_id: self.process_id,
            qubits,
        }
    }

    pub fn len(&self) -> usize {
        self.qubits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qubits.is_empty()
    }

    pub fn qubits(&self) -> &[QubitId] {
        &self.qubits
    }

    pub fn qubit_indices(&self) -> Vec<usize> {
        self.qubits.iter().map(QubitId::index).collect()
    }

    pub fn process_id(&self) -> Uuid {
        self.process_id
    }

    pub(crate) fn core_handle(&self) -> WeakProcessCore {
        self.core.clone()
    }

    fn same_process(&self, other: &QubitGroup) -> bool {
        self.core.ptr_eq(&other.core)
    }

    /// Concatenate two groups of the same process, left then right.
    pub fn concat(&self, other: &QubitGroup) -> RuntimeResult<QubitGroup> {
        if !self.same_process(other) {
            return Err(RuntimeError::CrossProcess);
        }
        let mut qubits = self.qubits.clone();
        qubits.extend_from_slice(&other.qubits);
        Ok(self.derived(qubits))
    }

    /// Subset at the given 0-based positions, in the order given.
    pub fn at(&self, positions: &[usize]) -> RuntimeResult<QubitGroup> {
        let mut qubits = Vec::with_capacity(positions.len());
        for &position in positions {
            let qubit = self.qubits.get(position).copied().ok_or(
                RuntimeError::PositionOutOfBounds {
                    position,
                    length: self.qubits.len(),
                },
            )?;
            qubits.push(qubit);
        }
        Ok(self.derived(qubits))
    }

    /// Single-qubit group at the given position.
    pub fn index(&self, position: usize) -> RuntimeResult<QubitGroup> {
        self.at(&[position])
    }

    /// Contiguous sub-range, order preserved.
    pub fn slice(&self, range: Range<usize>) -> RuntimeResult<QubitGroup> {
        if range.end > self.qubits.len() || range.start > range.end {
            return Err(RuntimeError::PositionOutOfBounds {
                position: range.end,
                length: self.qubits.len(),
            });
        }
        Ok(self.derived(self.qubits[range].to_vec()))
    }

    /// New group with reversed qubit order.
    pub fn reversed(&self) -> QubitGroup {
        let mut qubits = self.qubits.clone();
        qubits.reverse();
        self.derived(qubits)
    }

    /// Iterate over single-qubit subgroups in order.
    pub fn iter(&self) -> impl Iterator<Item = QubitGroup> + '_ {
        self.qubits.iter().map(|qubit| self.derived(vec![*qubit]))
    }
}

// =============================================================================
// 2. Gate issuance
// =============================================================================

impl QubitGroup {
    /// Apply an opaque gate to every qubit in the group, in group order.
    pub fn apply(&self, gate: GateKind) -> RuntimeResult<()> {
        self.issue_gate(gate, &[])
    }

    /// Apply an opaque gate to every qubit in the group, controlled on all
    /// qubits of `control`. Both groups must belong to the same process.
    pub fn apply_controlled(&self, gate: GateKind, control: &QubitGroup) -> RuntimeResult<()> {
        if !self.same_process(control) {
            return Err(RuntimeError::CrossProcess);
        }
        self.issue_gate(gate, &control.qubits)
    }

    fn issue_gate(&self, gate: GateKind, control: &[QubitId]) -> RuntimeResult<()> {
        let core = upgrade_core(&self.core)?;
        let mut core = core.write();
        core.controller.ensure_accepting()?;
        for target in &self.qubits {
            core.engine.apply_gate(gate, control, *target)?;
        }
        Ok(())
    }
}

// =============================================================================
// 3. Lifecycle
// =============================================================================

impl QubitGroup {
    /// Release every qubit in the group.
    ///
    /// The caller is responsible for having returned each qubit to the |0⟩
    /// basis state first; the runtime performs no verification and freeing a
    /// qubit in any other state is undefined behavior by contract.
    pub fn free(&self) -> RuntimeResult<()> {
        let core = upgrade_core(&self.core)?;
        let mut core = core.write();
        core.controller.ensure_accepting()?;
        for qubit in &self.qubits {
            core.engine.free_qubit(*qubit)?;
            core.registry.record_release(*qubit);
        }
        Ok(())
    }

    /// True when every contained qubit reports free.
    pub fn is_free(&self) -> RuntimeResult<bool> {
        let core = upgrade_core(&self.core)?;
        let core = core.read();
        for qubit in &self.qubits {
            if core.engine.qubit_status(*qubit)? != QubitStatus::Free {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Use the group as a scoped resource: run `body`, then require every
    /// contained qubit to be free. Leaked qubits are a reported error, not a
    /// silent no-op.
    pub fn scoped<T, F>(&self, body: F) -> RuntimeResult<T>
    where
        F: FnOnce(&QubitGroup) -> RuntimeResult<T>,
    {
        let value = body(self)?;

        let core = upgrade_core(&self.core)?;
        let core = core.read();
        let mut leaked = Vec::new();
        for qubit in &self.qubits {
            if core.engine.qubit_status(*qubit)? != QubitStatus::Free {
                leaked.push(qubit.index());
            }
        }
        if !leaked.is_empty() {
            return Err(RuntimeError::ScopeLeak { qubits: leaked });
        }
        Ok(value)
    }
}
