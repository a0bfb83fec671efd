// =============================================================================
// Quantum Process Runtime - Reference Engine
// =============================================================================
// Table of Contents:
//   1. EngineExecutionMode - Live vs. batch dispatch
//   2. Pending result bookkeeping
//   3. ReferenceEngine - Deterministic in-memory ExecutionEngine
//   4. Fixture staging - Snapshot/sample/measurement overrides
//   5. ExecutionEngine implementation
// =============================================================================
// Purpose: A deterministic engine for tests, demos, and bring-up. It is a
//          bookkeeping engine, not a simulator: it tracks per-qubit
//          computational-basis bits (Pauli-X flips a bit, every other gate is
//          recorded and otherwise ignored), logs instructions, and computes
//          execution metadata. Superposition scenarios are expressed by
//          staging raw snapshot records or sample histograms.
// =============================================================================

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use crate::contract::{
    EngineError, EngineResult, ExecutionEngine, MeasurementId, QubitId, QubitStatus,
    SampleHistogram, SampleId, SnapshotId, SnapshotRecord,
};
use crate::instruction::{GateKind, InstructionRecord};
use crate::metadata::{ExecutionMetadata, ExecutionStatus};

/// Width limit of a single engine measurement call, in qubits.
pub const MEASUREMENT_WORD_WIDTH: usize = 64;

// =============================================================================
// 1. EngineExecutionMode
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineExecutionMode {
    /// Every instruction executes immediately; results are ready on request.
    Live,
    /// Instructions queue; results become ready after `prepare_for_execution`.
    Batch,
}

// =============================================================================
// 2. Pending result bookkeeping
// =============================================================================

#[derive(Debug, Clone)]
struct PendingMeasurement {
    value: u64,
}

#[derive(Debug, Clone)]
struct PendingSnapshot {
    records: Vec<SnapshotRecord>,
}

#[derive(Debug, Clone)]
struct PendingSample {
    histogram: SampleHistogram,
}

#[derive(Debug, Clone)]
struct QubitSlot {
    status: QubitStatus,
    /// Tracked computational-basis bit.
    bit: bool,
    /// Gate-layer depth reached at this qubit.
    depth: usize,
}

// =============================================================================
// 3. ReferenceEngine
// =============================================================================

#[derive(Debug)]
pub struct ReferenceEngine {
    execution_mode: EngineExecutionMode,
    qubit_capacity: usize,
    qubits: Vec<QubitSlot>,
    allocated_count: usize,
    simultaneous_high_water: usize,
    instruction_log: Vec<InstructionRecord>,
    measurements: Vec<PendingMeasurement>,
    snapshots: Vec<PendingSnapshot>,
    samples: Vec<PendingSample>,
    flushed: bool,
    created_at: Instant,
    execution_time: Option<f64>,
    timeout: Option<u64>,
    staged_measurement_values: VecDeque<u64>,
    staged_snapshot_records: VecDeque<Vec<SnapshotRecord>>,
    staged_sample_histograms: VecDeque<SampleHistogram>,
}

impl ReferenceEngine {
    pub fn new(qubit_capacity: usize, execution_mode: EngineExecutionMode) -> Self {
        Self {
            execution_mode,
            qubit_capacity,
            qubits: Vec::new(),
            allocated_count: 0,
            simultaneous_high_water: 0,
            instruction_log: Vec::new(),
            measurements: Vec::new(),
            snapshots: Vec::new(),
            samples: Vec::new(),
            flushed: false,
            created_at: Instant::now(),
            execution_time: None,
            timeout: None,
            staged_measurement_values: VecDeque::new(),
            staged_snapshot_records: VecDeque::new(),
            staged_sample_histograms: VecDeque::new(),
        }
    }

    pub fn live(qubit_capacity: usize) -> Self {
        Self::new(qubit_capacity, EngineExecutionMode::Live)
    }

    pub fn batch(qubit_capacity: usize) -> Self {
        Self::new(qubit_capacity, EngineExecutionMode::Batch)
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout = Some(timeout_seconds);
        self
    }

    pub fn execution_mode(&self) -> EngineExecutionMode {
        self.execution_mode
    }

    fn results_ready(&self) -> bool {
        self.flushed || self.execution_mode == EngineExecutionMode::Live
    }

    fn slot(&self, qubit: QubitId) -> EngineResult<&QubitSlot> {
        self.qubits
            .get(qubit.index())
            .ok_or(EngineError::UnknownQubit(qubit))
    }

    fn allocated_slot(&self, qubit: QubitId) -> EngineResult<&QubitSlot> {
        let slot = self.slot(qubit)?;
        if slot.status != QubitStatus::Allocated {
            return Err(EngineError::QubitNotAllocated(qubit));
        }
        Ok(slot)
    }

    fn require_allocated(&self, qubits: &[QubitId]) -> EngineResult<()> {
        for qubit in qubits {
            self.allocated_slot(*qubit)?;
        }
        Ok(())
    }

    /// Tracked basis-state label of the given qubits, first qubit as the
    /// most significant bit.
    fn basis_label(&self, qubits: &[QubitId]) -> EngineResult<u128> {
        let mut label = 0u128;
        for qubit in qubits {
            let slot = self.allocated_slot(*qubit)?;
            label = (label << 1) | u128::from(slot.bit);
        }
        Ok(label)
    }

    fn default_snapshot_records(&self, qubits: &[QubitId]) -> EngineResult<Vec<SnapshotRecord>> {
        let label = self.basis_label(qubits)?;
        let chunk_count = qubits.len().div_ceil(MEASUREMENT_WORD_WIDTH).max(1);
        let mut basis_chunks = Vec::with_capacity(chunk_count);
        for i in (0..chunk_count).rev() {
            basis_chunks.push((label >> (i * MEASUREMENT_WORD_WIDTH)) as u64);
        }
        Ok(vec![SnapshotRecord {
            basis_chunks,
            amplitude_real: 1.0,
            amplitude_imag: 0.0,
        }])
    }

    fn serialize_into<T: serde::Serialize>(value: &T, buffer: &mut [u8]) -> EngineResult<usize> {
        let payload =
            serde_json::to_vec(value).map_err(|e| EngineError::Serialization(e.to_string()))?;
        if payload.len() <= buffer.len() {
            buffer[..payload.len()].copy_from_slice(&payload);
        }
        Ok(payload.len())
    }

    pub fn metadata(&self) -> ExecutionMetadata {
        let status = if self.flushed {
            ExecutionStatus::Completed
        } else {
            match self.execution_mode {
                EngineExecutionMode::Live => ExecutionStatus::Live,
                EngineExecutionMode::Batch => ExecutionStatus::Batch,
            }
        };

        let mut gate_count: BTreeMap<usize, usize> = BTreeMap::new();
        for record in &self.instruction_log {
            if let Some(arity) = record.gate_arity() {
                *gate_count.entry(arity).or_insert(0) += 1;
            }
        }

        ExecutionMetadata {
            depth: self.qubits.iter().map(|slot| slot.depth).max().unwrap_or(0),
            gate_count,
            qubit_simultaneous: self.simultaneous_high_water,
            status,
            execution_time: self.execution_time,
            timeout: self.timeout,
        }
    }

    pub fn instruction_log(&self) -> &[InstructionRecord] {
        &self.instruction_log
    }
}

// =============================================================================
// 4. Fixture staging
// =============================================================================

impl ReferenceEngine {
    /// Stage the value the next measurement request resolves to.
    pub fn stage_measurement_value(&mut self, value: u64) {
        self.staged_measurement_values.push_back(value);
    }

    /// Stage raw amplitude records for the next snapshot request. This is how
    /// superposition states reach the decoder without any simulation.
    pub fn stage_snapshot_records(&mut self, records: Vec<SnapshotRecord>) {
        self.staged_snapshot_records.push_back(records);
    }

    /// Stage the histogram the next sample request resolves to.
    pub fn stage_sample_histogram(&mut self, histogram: SampleHistogram) {
        self.staged_sample_histograms.push_back(histogram);
    }
}

// =============================================================================
// 5. ExecutionEngine implementation
// =============================================================================

impl ExecutionEngine for ReferenceEngine {
    fn allocate_qubit(&mut self) -> EngineResult<QubitId> {
        if self.allocated_count >= self.qubit_capacity {
            return Err(EngineError::CapacityExceeded {
                capacity: self.qubit_capacity,
            });
        }

        // Index space grows monotonically; freed indices are never reused.
        let qubit = QubitId(self.qubits.len());
        self.qubits.push(QubitSlot {
            status: QubitStatus::Allocated,
            bit: false,
            depth: 0,
        });
        self.allocated_count += 1;
        self.simultaneous_high_water = self.simultaneous_high_water.max(self.allocated_count);
        self.instruction_log.push(InstructionRecord::Alloc {
            target: qubit.index(),
        });
        Ok(qubit)
    }

    fn free_qubit(&mut self, qubit: QubitId) -> EngineResult<()> {
        let slot = self
            .qubits
            .get_mut(qubit.index())
            .ok_or(EngineError::UnknownQubit(qubit))?;
        if slot.status != QubitStatus::Allocated {
            return Err(EngineError::QubitNotAllocated(qubit));
        }
        slot.status = QubitStatus::Free;
        self.allocated_count -= 1;
        self.instruction_log.push(InstructionRecord::Free {
            target: qubit.index(),
        });
        Ok(())
    }

    fn qubit_status(&self, qubit: QubitId) -> EngineResult<QubitStatus> {
        Ok(self.slot(qubit)?.status)
    }

    fn apply_gate(
        &mut self,
        gate: GateKind,
        control: &[QubitId],
        target: QubitId,
    ) -> EngineResult<()> {
        self.require_allocated(control)?;
        self.allocated_slot(target)?;

        // Uncontrolled Pauli-X flips the tracked bit; a controlled X fires
        // only when every tracked control bit is set.
        if matches!(gate, GateKind::PauliX) {
            let fires = control
                .iter()
                .all(|qubit| self.qubits[qubit.index()].bit);
            if fires {
                let slot = &mut self.qubits[target.index()];
                slot.bit = !slot.bit;
            }
        }

        let layer = control
            .iter()
            .chain(std::iter::once(&target))
            .map(|qubit| self.qubits[qubit.index()].depth)
            .max()
            .unwrap_or(0)
            + 1;
        for qubit in control.iter().chain(std::iter::once(&target)) {
            self.qubits[qubit.index()].depth = layer;
        }

        self.instruction_log.push(InstructionRecord::Gate {
            gate,
            control: control.iter().map(|qubit| qubit.index()).collect(),
            target: target.index(),
        });
        Ok(())
    }

    fn measure(&mut self, qubits: &[QubitId]) -> EngineResult<MeasurementId> {
        if qubits.len() > MEASUREMENT_WORD_WIDTH {
            return Err(EngineError::QueryFailed(format!(
                "measurement over {} qubits exceeds the {}-qubit word width",
                qubits.len(),
                MEASUREMENT_WORD_WIDTH
            )));
        }
        self.require_allocated(qubits)?;

        let value = match self.staged_measurement_values.pop_front() {
            Some(staged) => staged,
            None => self.basis_label(qubits)? as u64,
        };

        let index = MeasurementId(self.measurements.len());
        self.measurements.push(PendingMeasurement { value });
        self.instruction_log.push(InstructionRecord::Measure {
            qubits: qubits.iter().map(|qubit| qubit.index()).collect(),
            index: index.0,
        });
        Ok(index)
    }

    fn measurement_result(&self, index: MeasurementId) -> EngineResult<Option<u64>> {
        let pending = self
            .measurements
            .get(index.0)
            .ok_or(EngineError::UnknownResultIndex(index.0))?;
        if !self.results_ready() {
            return Ok(None);
        }
        Ok(Some(pending.value))
    }

    fn capture_state(&mut self, qubits: &[QubitId]) -> EngineResult<SnapshotId> {
        self.require_allocated(qubits)?;

        let records = match self.staged_snapshot_records.pop_front() {
            Some(staged) => staged,
            None => self.default_snapshot_records(qubits)?,
        };

        let index = SnapshotId(self.snapshots.len());
        self.snapshots.push(PendingSnapshot { records });
        self.instruction_log.push(InstructionRecord::Dump {
            qubits: qubits.iter().map(|qubit| qubit.index()).collect(),
            index: index.0,
        });
        Ok(index)
    }

    fn snapshot_record_count(&self, index: SnapshotId) -> EngineResult<Option<usize>> {
        let pending = self
            .snapshots
            .get(index.0)
            .ok_or(EngineError::UnknownResultIndex(index.0))?;
        if !self.results_ready() {
            return Ok(None);
        }
        Ok(Some(pending.records.len()))
    }

    fn snapshot_record(&self, index: SnapshotId, record: usize) -> EngineResult<SnapshotRecord> {
        let pending = self
            .snapshots
            .get(index.0)
            .ok_or(EngineError::UnknownResultIndex(index.0))?;
        pending
            .records
            .get(record)
            .cloned()
            .ok_or(EngineError::SnapshotRecordOutOfRange {
                record,
                available: pending.records.len(),
            })
    }

    fn sample(&mut self, qubits: &[QubitId], shots: u64) -> EngineResult<SampleId> {
        self.require_allocated(qubits)?;

        let histogram = match self.staged_sample_histograms.pop_front() {
            Some(staged) => staged,
            None => {
                let mut counts = BTreeMap::new();
                counts.insert(self.basis_label(qubits)?, shots);
                SampleHistogram { counts }
            }
        };

        let index = SampleId(self.samples.len());
        self.samples.push(PendingSample { histogram });
        self.instruction_log.push(InstructionRecord::Sample {
            qubits: qubits.iter().map(|qubit| qubit.index()).collect(),
            index: index.0,
            shots,
        });
        Ok(index)
    }

    fn sample_result(&self, index: SampleId) -> EngineResult<Option<SampleHistogram>> {
        let pending = self
            .samples
            .get(index.0)
            .ok_or(EngineError::UnknownResultIndex(index.0))?;
        if !self.results_ready() {
            return Ok(None);
        }
        Ok(Some(pending.histogram.clone()))
    }

    fn prepare_for_execution(&mut self) -> EngineResult<()> {
        if self.flushed && self.execution_mode == EngineExecutionMode::Batch {
            return Err(EngineError::AlreadyFlushed);
        }
        self.flushed = true;
        self.execution_time = Some(self.created_at.elapsed().as_secs_f64());
        tracing::debug!(
            instructions = self.instruction_log.len(),
            mode = ?self.execution_mode,
            "engine_flushed"
        );
        Ok(())
    }

    fn instructions_json(&self, buffer: &mut [u8]) -> EngineResult<usize> {
        Self::serialize_into(&self.instruction_log, buffer)
    }

    fn metadata_json(&self, buffer: &mut [u8]) -> EngineResult<usize> {
        Self::serialize_into(&self.metadata(), buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocate(engine: &mut ReferenceEngine, count: usize) -> Vec<QubitId> {
        (0..count).map(|_| engine.allocate_qubit().unwrap()).collect()
    }

    #[test]
    fn test_allocation_is_monotonic() {
        let mut engine = ReferenceEngine::live(8);
        let qubits = allocate(&mut engine, 3);
        engine.free_qubit(qubits[1]).unwrap();
        let fresh = engine.allocate_qubit().unwrap();
        assert_eq!(fresh, QubitId(3));
        assert_eq!(engine.qubit_status(qubits[1]).unwrap(), QubitStatus::Free);
    }

    #[test]
    fn test_capacity_limit() {
        let mut engine = ReferenceEngine::live(2);
        allocate(&mut engine, 2);
        assert!(matches!(
            engine.allocate_qubit(),
            Err(EngineError::CapacityExceeded { capacity: 2 })
        ));
    }

    #[test]
    fn test_live_measurement_tracks_pauli_x() {
        let mut engine = ReferenceEngine::live(4);
        let qubits = allocate(&mut engine, 2);
        engine.apply_gate(GateKind::PauliX, &[], qubits[1]).unwrap();
        let index = engine.measure(&qubits).unwrap();
        assert_eq!(engine.measurement_result(index).unwrap(), Some(0b01));
    }

    #[test]
    fn test_controlled_x_fires_on_set_control() {
        let mut engine = ReferenceEngine::live(4);
        let qubits = allocate(&mut engine, 2);
        engine.apply_gate(GateKind::PauliX, &[], qubits[0]).unwrap();
        engine
            .apply_gate(GateKind::PauliX, &[qubits[0]], qubits[1])
            .unwrap();
        let index = engine.measure(&qubits).unwrap();
        assert_eq!(engine.measurement_result(index).unwrap(), Some(0b11));
    }

    #[test]
    fn test_batch_results_ready_only_after_flush() {
        let mut engine = ReferenceEngine::batch(4);
        let qubits = allocate(&mut engine, 2);
        let index = engine.measure(&qubits).unwrap();
        assert_eq!(engine.measurement_result(index).unwrap(), None);

        engine.prepare_for_execution().unwrap();
        assert_eq!(engine.measurement_result(index).unwrap(), Some(0));
    }

    #[test]
    fn test_batch_double_flush_is_an_error() {
        let mut engine = ReferenceEngine::batch(2);
        engine.prepare_for_execution().unwrap();
        assert!(matches!(
            engine.prepare_for_execution(),
            Err(EngineError::AlreadyFlushed)
        ));
    }

    #[test]
    fn test_default_snapshot_is_tracked_basis_state() {
        let mut engine = ReferenceEngine::live(4);
        let qubits = allocate(&mut engine, 2);
        engine.apply_gate(GateKind::PauliX, &[], qubits[0]).unwrap();
        let index = engine.capture_state(&qubits).unwrap();
        assert_eq!(engine.snapshot_record_count(index).unwrap(), Some(1));
        let record = engine.snapshot_record(index, 0).unwrap();
        assert_eq!(record.basis_chunks, vec![0b10]);
        assert_eq!(record.amplitude_real, 1.0);
    }

    #[test]
    fn test_staged_snapshot_overrides_default() {
        let mut engine = ReferenceEngine::live(4);
        let qubits = allocate(&mut engine, 2);
        engine.stage_snapshot_records(vec![
            SnapshotRecord {
                basis_chunks: vec![1],
                amplitude_real: 0.0,
                amplitude_imag: -std::f64::consts::FRAC_1_SQRT_2,
            },
            SnapshotRecord {
                basis_chunks: vec![2],
                amplitude_real: 0.0,
                amplitude_imag: std::f64::consts::FRAC_1_SQRT_2,
            },
        ]);
        let index = engine.capture_state(&qubits).unwrap();
        assert_eq!(engine.snapshot_record_count(index).unwrap(), Some(2));
    }

    #[test]
    fn test_metadata_counts_and_depth() {
        let mut engine = ReferenceEngine::live(4);
        let qubits = allocate(&mut engine, 2);
        engine.apply_gate(GateKind::Hadamard, &[], qubits[0]).unwrap();
        engine
            .apply_gate(GateKind::PauliX, &[qubits[0]], qubits[1])
            .unwrap();

        let metadata = engine.metadata();
        assert_eq!(metadata.depth, 2);
        assert_eq!(metadata.gate_count.get(&1), Some(&1));
        assert_eq!(metadata.gate_count.get(&2), Some(&1));
        assert_eq!(metadata.qubit_simultaneous, 2);
        assert_eq!(metadata.status, ExecutionStatus::Live);
        assert!(metadata.execution_time.is_none());
    }

    #[test]
    fn test_execution_time_present_after_flush() {
        let mut engine = ReferenceEngine::batch(2);
        engine.prepare_for_execution().unwrap();
        let metadata = engine.metadata();
        assert_eq!(metadata.status, ExecutionStatus::Completed);
        assert!(metadata.execution_time.is_some());
    }

    #[test]
    fn test_buffer_protocol_reports_required_size() {
        let mut engine = ReferenceEngine::live(4);
        let qubits = allocate(&mut engine, 2);
        engine.apply_gate(GateKind::Hadamard, &[], qubits[0]).unwrap();

        let mut tiny = [0u8; 4];
        let needed = engine.instructions_json(&mut tiny).unwrap();
        assert!(needed > tiny.len());

        let mut buffer = vec![0u8; needed];
        let written = engine.instructions_json(&mut buffer).unwrap();
        assert_eq!(written, needed);
        let decoded: Vec<InstructionRecord> =
            serde_json::from_slice(&buffer[..written]).unwrap();
        assert_eq!(decoded.len(), engine.instruction_log().len());
    }

    #[test]
    fn test_wide_measurement_rejected() {
        let mut engine = ReferenceEngine::live(80);
        let qubits = allocate(&mut engine, 65);
        assert!(engine.measure(&qubits).is_err());
    }

    #[test]
    fn test_gate_on_freed_qubit_rejected() {
        let mut engine = ReferenceEngine::live(2);
        let qubits = allocate(&mut engine, 1);
        engine.free_qubit(qubits[0]).unwrap();
        assert!(matches!(
            engine.apply_gate(GateKind::Hadamard, &[], qubits[0]),
            Err(EngineError::QubitNotAllocated(_))
        ));
    }
}
