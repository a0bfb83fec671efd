// =============================================================================
// Quantum Process Runtime - Engine Contract
// =============================================================================
// Table of Contents:
//   1. Typed Engine Handles - QubitId, MeasurementId, SnapshotId, SampleId
//   2. QubitStatus - Allocation state reported by the engine
//   3. SnapshotRecord / SampleHistogram - Raw result payloads
//   4. EngineError - Engine-side failure taxonomy
//   5. ExecutionEngine - The narrow trait the runtime consumes
// =============================================================================
// Purpose: Defines the complete surface the process runtime is allowed to
//          reach through. An engine queues or executes instructions according
//          to its own mode, hands out opaque result indices immediately, and
//          reports readiness when polled.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::instruction::GateKind;

// =============================================================================
// 1. Typed Engine Handles
// =============================================================================

/// Process-scoped index of one qubit slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QubitId(pub usize);

/// Opaque engine-assigned index of a pending measurement result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasurementId(pub usize);

/// Opaque engine-assigned index of a pending state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub usize);

/// Opaque engine-assigned index of a pending shot-sampling request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleId(pub usize);

impl QubitId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for QubitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

// =============================================================================
// 2. QubitStatus
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QubitStatus {
    Allocated,
    Free,
}

impl QubitStatus {
    pub fn is_free(&self) -> bool {
        matches!(self, QubitStatus::Free)
    }
}

// =============================================================================
// 3. Raw Result Payloads
// =============================================================================

/// One packed amplitude record of a state snapshot.
///
/// The basis-state bit pattern may span several 64-bit words; `basis_chunks`
/// holds them most-significant chunk first. Engines may emit multiple records
/// for the same basis state; the decoder sums their amplitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub basis_chunks: Vec<u64>,
    pub amplitude_real: f64,
    pub amplitude_imag: f64,
}

/// Ready-made outcome histogram returned for a shot-sampling request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleHistogram {
    pub counts: BTreeMap<u128, u64>,
}

impl SampleHistogram {
    pub fn total_shots(&self) -> u64 {
        self.counts.values().sum()
    }
}

// =============================================================================
// 4. EngineError
// =============================================================================

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown qubit index: {0}")]
    UnknownQubit(QubitId),

    #[error("Qubit {0} is not allocated")]
    QubitNotAllocated(QubitId),

    #[error("Unknown result index: {0}")]
    UnknownResultIndex(usize),

    #[error("Snapshot record {record} out of range for snapshot with {available} records")]
    SnapshotRecordOutOfRange { record: usize, available: usize },

    #[error("Engine already flushed a batch program")]
    AlreadyFlushed,

    #[error("Qubit capacity exceeded: {capacity} qubits available")]
    CapacityExceeded { capacity: usize },

    #[error("Payload serialization failed: {0}")]
    Serialization(String),

    #[error("Engine query failed: {0}")]
    QueryFailed(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// 5. ExecutionEngine Trait
// =============================================================================

/// The complete contract an execution engine offers to the process runtime.
///
/// Every instruction-issuing method (`allocate_qubit`, `free_qubit`,
/// `apply_gate`, `measure`, `capture_state`, `sample`) is itself a quantum
/// instruction, queued or executed according to the engine's mode. Result
/// queries never block: an unready result is reported as `None` and becomes
/// ready either on a later poll or after `prepare_for_execution`.
///
/// `instructions_json` and `metadata_json` follow the growing-buffer
/// protocol: the return value is the number of bytes the payload needs, and
/// the payload is written only when it fits the supplied buffer.
pub trait ExecutionEngine: Send {
    fn allocate_qubit(&mut self) -> EngineResult<QubitId>;

    fn free_qubit(&mut self, qubit: QubitId) -> EngineResult<()>;

    fn qubit_status(&self, qubit: QubitId) -> EngineResult<QubitStatus>;

    fn apply_gate(
        &mut self,
        gate: GateKind,
        control: &[QubitId],
        target: QubitId,
    ) -> EngineResult<()>;

    fn measure(&mut self, qubits: &[QubitId]) -> EngineResult<MeasurementId>;

    fn measurement_result(&self, index: MeasurementId) -> EngineResult<Option<u64>>;

    fn capture_state(&mut self, qubits: &[QubitId]) -> EngineResult<SnapshotId>;

    fn snapshot_record_count(&self, index: SnapshotId) -> EngineResult<Option<usize>>;

    fn snapshot_record(&self, index: SnapshotId, record: usize) -> EngineResult<SnapshotRecord>;

    fn sample(&mut self, qubits: &[QubitId], shots: u64) -> EngineResult<SampleId>;

    fn sample_result(&self, index: SampleId) -> EngineResult<Option<SampleHistogram>>;

    /// Flush all queued instructions and make pending results ready.
    fn prepare_for_execution(&mut self) -> EngineResult<()>;

    fn instructions_json(&self, buffer: &mut [u8]) -> EngineResult<usize>;

    fn metadata_json(&self, buffer: &mut [u8]) -> EngineResult<usize>;
}
