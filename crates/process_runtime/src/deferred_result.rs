// =============================================================================
// Quantum Process Runtime - Deferred Results
// =============================================================================
// Table of Contents:
//   1. Measurement - Chunked computational-basis measurement
//   2. Samples - Shot histogram over a qubit group
//   3. QuantumState - Decoded amplitude snapshot
// =============================================================================
// Purpose: Handles for results that may not exist yet. Requesting a result
//          records the operation with the engine and returns a handle; the
//          handle polls for availability without side effects (`value`) or
//          forces a flush of the owning process and then resolves (`get`).
//          Resolved values are cached, so each result is fetched from the
//          engine at most once.
// =============================================================================

use std::collections::BTreeMap;

use num_complex::Complex64;

use engine_interface::contract::{EngineError, MeasurementId, SampleId, SnapshotId};
use engine_interface::reference_engine::MEASUREMENT_WORD_WIDTH;

use crate::error::{RuntimeError, RuntimeResult};
use crate::process::{upgrade_core, WeakProcessCore};
use crate::qubit_group::QubitGroup;
use crate::state_decoder::{DecodedState, StateDecoder};

/// Widest register a single measurement or snapshot may cover, in qubits.
pub const MAX_REGISTER_WIDTH: usize = 128;

fn unresolved_after_flush() -> RuntimeError {
    RuntimeError::EngineQuery(EngineError::QueryFailed(
        "result still unavailable after execution".into(),
    ))
}

// =============================================================================
// 1. Measurement
// =============================================================================

/// A requested computational-basis measurement. Registers wider than the
/// engine's measurement word are split into consecutive chunks at request
/// time; the logical value is assembled most-significant chunk first.
#[derive(Debug)]
pub struct Measurement {
    core: WeakProcessCore,
    chunks: Vec<(MeasurementId, usize)>,
    qubit_indices: Vec<usize>,
    cached: Option<u128>,
}

impl Measurement {
    /// Measure every qubit of `group`, first qubit as the most significant
    /// bit of the result.
    pub fn request(group: &QubitGroup) -> RuntimeResult<Self> {
        if group.len() > MAX_REGISTER_WIDTH {
            return Err(RuntimeError::RegisterTooWide {
                qubits: group.len(),
                max_width: MAX_REGISTER_WIDTH,
            });
        }

        let core_handle = group.core_handle();
        let core = upgrade_core(&core_handle)?;
        let mut core = core.write();
        core.controller.ensure_accepting()?;

        let mut chunks = Vec::new();
        for chunk in group.qubits().chunks(MEASUREMENT_WORD_WIDTH) {
            let index = core.engine.measure(chunk)?;
            chunks.push((index, chunk.len()));
        }
        drop(core);

        tracing::debug!(
            qubits = group.len(),
            chunks = chunks.len(),
            "measurement_requested"
        );
        Ok(Self {
            core: core_handle,
            chunks,
            qubit_indices: group.qubit_indices(),
            cached: None,
        })
    }

    /// The measured qubit indices, in result bit order.
    pub fn qubit_indices(&self) -> &[usize] {
        &self.qubit_indices
    }

    /// Poll for the measured value. `None` until the owning process has
    /// executed; never forces a flush.
    pub fn value(&mut self) -> RuntimeResult<Option<u128>> {
        if let Some(value) = self.cached {
            return Ok(Some(value));
        }

        let core = upgrade_core(&self.core)?;
        let core = core.read();
        let mut assembled = 0u128;
        for (index, width) in &self.chunks {
            match core.engine.measurement_result(*index)? {
                Some(chunk_value) => {
                    assembled = (assembled << width) | u128::from(chunk_value);
                }
                None => return Ok(None),
            }
        }
        drop(core);

        self.cached = Some(assembled);
        Ok(Some(assembled))
    }

    /// Resolve the measured value, flushing the owning process if needed.
    pub fn get(&mut self) -> RuntimeResult<u128> {
        if let Some(value) = self.value()? {
            return Ok(value);
        }
        upgrade_core(&self.core)?.write().execute()?;
        self.value()?.ok_or_else(unresolved_after_flush)
    }
}

// =============================================================================
// 2. Samples
// =============================================================================

/// A requested shot histogram: basis-state label to occurrence count.
#[derive(Debug)]
pub struct Samples {
    core: WeakProcessCore,
    index: SampleId,
    shots: u64,
    cached: Option<BTreeMap<u128, u64>>,
}

impl Samples {
    pub fn request(group: &QubitGroup, shots: u64) -> RuntimeResult<Self> {
        if group.len() > MAX_REGISTER_WIDTH {
            return Err(RuntimeError::RegisterTooWide {
                qubits: group.len(),
                max_width: MAX_REGISTER_WIDTH,
            });
        }

        let core_handle = group.core_handle();
        let core = upgrade_core(&core_handle)?;
        let mut core = core.write();
        core.controller.ensure_accepting()?;
        let index = core.engine.sample(group.qubits(), shots)?;
        drop(core);

        tracing::debug!(qubits = group.len(), shots = shots, "sample_requested");
        Ok(Self {
            core: core_handle,
            index,
            shots,
            cached: None,
        })
    }

    pub fn shots(&self) -> u64 {
        self.shots
    }

    /// Poll for the histogram; never forces a flush.
    pub fn value(&mut self) -> RuntimeResult<Option<BTreeMap<u128, u64>>> {
        if let Some(histogram) = &self.cached {
            return Ok(Some(histogram.clone()));
        }

        let core = upgrade_core(&self.core)?;
        let histogram = core.read().engine.sample_result(self.index)?;
        drop(core);

        if let Some(histogram) = histogram {
            self.cached = Some(histogram.counts.clone());
            return Ok(Some(histogram.counts));
        }
        Ok(None)
    }

    /// Resolve the histogram, flushing the owning process if needed.
    pub fn get(&mut self) -> RuntimeResult<BTreeMap<u128, u64>> {
        if let Some(histogram) = self.value()? {
            return Ok(histogram);
        }
        upgrade_core(&self.core)?.write().execute()?;
        self.value()?.ok_or_else(unresolved_after_flush)
    }
}

// =============================================================================
// 3. QuantumState
// =============================================================================

/// A requested amplitude snapshot. Raw records are fetched and decoded at
/// most once; every accessor after that reads the cached decoded state.
#[derive(Debug)]
pub struct QuantumState {
    core: WeakProcessCore,
    index: SnapshotId,
    qubit_count: usize,
    cached: Option<DecodedState>,
}

impl QuantumState {
    pub fn request(group: &QubitGroup) -> RuntimeResult<Self> {
        if group.len() > MAX_REGISTER_WIDTH {
            return Err(RuntimeError::RegisterTooWide {
                qubits: group.len(),
                max_width: MAX_REGISTER_WIDTH,
            });
        }

        let core_handle = group.core_handle();
        let core = upgrade_core(&core_handle)?;
        let mut core = core.write();
        core.controller.ensure_accepting()?;
        let index = core.engine.capture_state(group.qubits())?;
        drop(core);

        tracing::debug!(qubits = group.len(), "snapshot_requested");
        Ok(Self {
            core: core_handle,
            index,
            qubit_count: group.len(),
            cached: None,
        })
    }

    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    /// Poll for the decoded amplitude mapping; never forces a flush.
    pub fn states(&mut self) -> RuntimeResult<Option<BTreeMap<u128, Complex64>>> {
        Ok(self.poll_decoded()?.map(|decoded| decoded.states().clone()))
    }

    /// Resolve the amplitude mapping, flushing the owning process if needed.
    pub fn get(&mut self) -> RuntimeResult<BTreeMap<u128, Complex64>> {
        Ok(self.force_decoded()?.states().clone())
    }

    /// Basis state to probability, forcing resolution.
    pub fn probabilities(&mut self) -> RuntimeResult<BTreeMap<u128, f64>> {
        Ok(self.force_decoded()?.probabilities())
    }

    /// Draw `shots` outcomes from the resolved distribution; `None` while the
    /// snapshot is unresolved. Deterministic for a given seed; never forces a
    /// flush.
    pub fn sample(
        &mut self,
        shots: u64,
        seed: Option<u64>,
    ) -> RuntimeResult<Option<BTreeMap<u128, u64>>> {
        Ok(self
            .poll_decoded()?
            .map(|decoded| decoded.sample(shots, seed)))
    }

    /// Render the resolved state as a formatted listing.
    pub fn show(&mut self, format: Option<&str>) -> RuntimeResult<String> {
        self.force_decoded()?.show(format)
    }

    fn poll_decoded(&mut self) -> RuntimeResult<Option<&DecodedState>> {
        if self.cached.is_none() {
            let core = upgrade_core(&self.core)?;
            let core = core.read();
            let record_count = match core.engine.snapshot_record_count(self.index)? {
                Some(count) => count,
                None => return Ok(None),
            };
            let mut records = Vec::with_capacity(record_count);
            for record in 0..record_count {
                records.push(core.engine.snapshot_record(self.index, record)?);
            }
            drop(core);
            self.cached = Some(StateDecoder::decode(&records, self.qubit_count)?);
        }
        Ok(self.cached.as_ref())
    }

    fn force_decoded(&mut self) -> RuntimeResult<&DecodedState> {
        if self.cached.is_none() && self.poll_decoded()?.is_none() {
            upgrade_core(&self.core)?.write().execute()?;
        }
        if self.cached.is_none() && self.poll_decoded()?.is_none() {
            return Err(unresolved_after_flush());
        }
        self.cached.as_ref().ok_or_else(unresolved_after_flush)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::ProcessConfiguration;
    use crate::process::QuantumProcess;
    use engine_interface::contract::{SampleHistogram, SnapshotRecord};
    use engine_interface::instruction::GateKind;
    use engine_interface::reference_engine::ReferenceEngine;

    const FRAC_1_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;

    fn staged_process<F>(capacity: usize, batch: bool, stage: F) -> QuantumProcess
    where
        F: FnOnce(&mut ReferenceEngine),
    {
        let configuration = if batch {
            ProcessConfiguration::batch(capacity)
        } else {
            ProcessConfiguration::live(capacity)
        };
        let mut engine = if batch {
            ReferenceEngine::batch(capacity)
        } else {
            ReferenceEngine::live(capacity)
        };
        stage(&mut engine);
        QuantumProcess::new(Box::new(engine), configuration)
    }

    #[test]
    fn test_live_measurement_resolves_immediately() {
        let process = QuantumProcess::with_reference_engine(ProcessConfiguration::live(4));
        let group = process.allocate(2).unwrap();
        group.index(1).unwrap().apply(GateKind::PauliX).unwrap();

        let mut measurement = Measurement::request(&group).unwrap();
        assert_eq!(measurement.value().unwrap(), Some(0b01));
        assert_eq!(measurement.qubit_indices(), &[0, 1]);
    }

    #[test]
    fn test_batch_measurement_polls_none_then_get_forces_flush() {
        let process = QuantumProcess::with_reference_engine(ProcessConfiguration::batch(4));
        let group = process.allocate(2).unwrap();
        group.apply(GateKind::PauliX).unwrap();

        let mut measurement = Measurement::request(&group).unwrap();
        assert_eq!(measurement.value().unwrap(), None);
        assert!(!process.is_executed());

        assert_eq!(measurement.get().unwrap(), 0b11);
        assert!(process.is_executed());

        // Cached; the terminal process no longer matters.
        assert_eq!(measurement.get().unwrap(), 0b11);
    }

    #[test]
    fn test_wide_measurement_assembles_chunks_most_significant_first() {
        // 70 qubits split 64 + 6; staged chunk values 1 and 3.
        let process = staged_process(70, false, |engine| {
            engine.stage_measurement_value(1);
            engine.stage_measurement_value(3);
        });
        let group = process.allocate(70).unwrap();

        let mut measurement = Measurement::request(&group).unwrap();
        assert_eq!(measurement.get().unwrap(), (1u128 << 6) | 3);
    }

    #[test]
    fn test_measurement_beyond_maximum_width_rejected() {
        let process = QuantumProcess::with_reference_engine(ProcessConfiguration::live(130));
        let group = process.allocate(129).unwrap();
        assert!(matches!(
            Measurement::request(&group),
            Err(RuntimeError::RegisterTooWide {
                qubits: 129,
                max_width: 128
            })
        ));
    }

    #[test]
    fn test_measurement_after_batch_flush_rejected() {
        let process = QuantumProcess::with_reference_engine(ProcessConfiguration::batch(4));
        let group = process.allocate(2).unwrap();
        process.execute().unwrap();
        assert!(matches!(
            Measurement::request(&group),
            Err(RuntimeError::ProcessAlreadyExecuted)
        ));
    }

    #[test]
    fn test_measurement_on_released_process() {
        let process = QuantumProcess::with_reference_engine(ProcessConfiguration::batch(4));
        let group = process.allocate(1).unwrap();
        let mut measurement = Measurement::request(&group).unwrap();
        drop(process);
        assert!(matches!(
            measurement.value(),
            Err(RuntimeError::ProcessReleased)
        ));
    }

    #[test]
    fn test_samples_default_histogram_carries_all_shots() {
        let process = QuantumProcess::with_reference_engine(ProcessConfiguration::live(4));
        let group = process.allocate(2).unwrap();
        group.index(0).unwrap().apply(GateKind::PauliX).unwrap();

        let mut samples = Samples::request(&group, 1024).unwrap();
        assert_eq!(samples.shots(), 1024);
        let histogram = samples.get().unwrap();
        assert_eq!(histogram.get(&0b10), Some(&1024));
    }

    #[test]
    fn test_batch_samples_poll_then_force() {
        let mut counts = BTreeMap::new();
        counts.insert(1u128, 500u64);
        counts.insert(2u128, 524u64);
        let staged = counts.clone();
        let process = staged_process(4, true, move |engine| {
            engine.stage_sample_histogram(SampleHistogram { counts: staged });
        });
        let group = process.allocate(2).unwrap();

        let mut samples = Samples::request(&group, 1024).unwrap();
        assert_eq!(samples.value().unwrap(), None);
        assert_eq!(samples.get().unwrap(), counts);
        assert!(process.is_executed());
    }

    fn opposed_phase_records() -> Vec<SnapshotRecord> {
        vec![
            SnapshotRecord {
                basis_chunks: vec![1],
                amplitude_real: 0.0,
                amplitude_imag: -0.707107,
            },
            SnapshotRecord {
                basis_chunks: vec![2],
                amplitude_real: 0.0,
                amplitude_imag: 0.707107,
            },
        ]
    }

    #[test]
    fn test_quantum_state_decodes_staged_superposition() {
        let process = staged_process(4, false, |engine| {
            engine.stage_snapshot_records(opposed_phase_records());
        });
        let group = process.allocate(2).unwrap();

        let mut state = QuantumState::request(&group).unwrap();
        let probabilities = state.probabilities().unwrap();
        assert!((probabilities[&1] - 0.5).abs() < 1e-6);
        assert!((probabilities[&2] - 0.5).abs() < 1e-6);

        let states = state.get().unwrap();
        assert!(states[&1].im < 0.0);
        assert!(states[&2].im > 0.0);
    }

    #[test]
    fn test_batch_quantum_state_poll_then_force() {
        let process = staged_process(4, true, |engine| {
            engine.stage_snapshot_records(opposed_phase_records());
        });
        let group = process.allocate(2).unwrap();

        let mut state = QuantumState::request(&group).unwrap();
        assert_eq!(state.states().unwrap(), None);
        assert!(!process.is_executed());

        let states = state.get().unwrap();
        assert_eq!(states.len(), 2);
        assert!(process.is_executed());
    }

    #[test]
    fn test_quantum_state_sampling_is_seed_stable() {
        let process = staged_process(4, false, |engine| {
            engine.stage_snapshot_records(opposed_phase_records());
        });
        let group = process.allocate(2).unwrap();

        let mut state = QuantumState::request(&group).unwrap();
        let first = state.sample(2048, Some(7)).unwrap().unwrap();
        let second = state.sample(2048, Some(7)).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.values().sum::<u64>(), 2048);
    }

    #[test]
    fn test_unresolved_sampling_reports_unknown() {
        let process = staged_process(4, true, |engine| {
            engine.stage_snapshot_records(opposed_phase_records());
        });
        let group = process.allocate(2).unwrap();
        let mut state = QuantumState::request(&group).unwrap();
        assert_eq!(state.sample(64, Some(1)).unwrap(), None);
        assert!(!process.is_executed());
    }

    #[test]
    fn test_quantum_state_show_listing() {
        let process = staged_process(4, false, |engine| {
            engine.stage_snapshot_records(opposed_phase_records());
        });
        let group = process.allocate(2).unwrap();

        let mut state = QuantumState::request(&group).unwrap();
        let listing = state.show(None).unwrap();
        assert!(listing.contains("|01⟩"));
        assert!(listing.contains("|10⟩"));
        assert!(listing.contains("(50.00%)"));
    }

    #[test]
    fn test_default_snapshot_reflects_tracked_basis_state() {
        let process = QuantumProcess::with_reference_engine(ProcessConfiguration::live(4));
        let group = process.allocate(2).unwrap();
        group.index(0).unwrap().apply(GateKind::PauliX).unwrap();

        let mut state = QuantumState::request(&group).unwrap();
        let states = state.get().unwrap();
        assert_eq!(states.len(), 1);
        assert!((states[&0b10].re - 1.0).abs() < 1e-12);
    }
}
