// =============================================================================
// Quantum Process Runtime - Quantum Process
// =============================================================================
// Table of Contents:
//   1. ExecutionController - Flush state machine
//   2. ProcessCore - Engine, controller, registry behind one lock
//   3. QuantumProcess - User-facing process handle
// =============================================================================
// Purpose: A process owns the execution engine, the qubit registry, and the
//          flush state machine. Qubit groups and deferred results hold weak
//          back-references to the process core that are upgraded and checked
//          on every use, so a torn-down process is reported, never dangling.
// =============================================================================

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use uuid::Uuid;

use engine_interface::contract::{ExecutionEngine, QubitId};
use engine_interface::instruction::InstructionRecord;
use engine_interface::metadata::ExecutionMetadata;
use engine_interface::reference_engine::{EngineExecutionMode, ReferenceEngine};

use crate::buffer_channel::GrowableBuffer;
use crate::configuration::{default_configuration, ExecutionMode, ProcessConfiguration};
use crate::error::{RuntimeError, RuntimeResult};
use crate::qubit_group::QubitGroup;
use crate::qubit_registry::QubitRegistry;

const METADATA_BUFFER_CAPACITY: usize = 512;
const INSTRUCTIONS_BUFFER_CAPACITY: usize = 2048;

// =============================================================================
// 1. ExecutionController
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Instructions may be issued.
    Accepting,
    /// Terminal: a batch program has been flushed. Irreversible.
    Executed,
}

#[derive(Debug)]
pub struct ExecutionController {
    execution_mode: ExecutionMode,
    state: ControllerState,
}

impl ExecutionController {
    pub fn new(execution_mode: ExecutionMode) -> Self {
        Self {
            execution_mode,
            state: ControllerState::Accepting,
        }
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_executed(&self) -> bool {
        self.state == ControllerState::Executed
    }

    /// Guard for every instruction-issuing call.
    pub fn ensure_accepting(&self) -> RuntimeResult<()> {
        match self.state {
            ControllerState::Accepting => Ok(()),
            ControllerState::Executed => Err(RuntimeError::ProcessAlreadyExecuted),
        }
    }

    /// Record a completed flush. Only a batch flush is terminal; a live
    /// process stays open for further instructions.
    pub fn record_flush(&mut self) {
        if self.execution_mode == ExecutionMode::Batch {
            self.state = ControllerState::Executed;
        }
    }
}

// =============================================================================
// 2. ProcessCore
// =============================================================================

pub(crate) struct ProcessCore {
    pub(crate) engine: Box<dyn ExecutionEngine>,
    pub(crate) controller: ExecutionController,
    pub(crate) registry: QubitRegistry,
    metadata_buffer: GrowableBuffer,
    instructions_buffer: GrowableBuffer,
}

pub(crate) type SharedProcessCore = Arc<RwLock<ProcessCore>>;
pub(crate) type WeakProcessCore = Weak<RwLock<ProcessCore>>;

/// Upgrade a handle's back-reference, reporting a released process.
pub(crate) fn upgrade_core(weak: &WeakProcessCore) -> RuntimeResult<SharedProcessCore> {
    weak.upgrade().ok_or(RuntimeError::ProcessReleased)
}

impl ProcessCore {
    fn new(engine: Box<dyn ExecutionEngine>, execution_mode: ExecutionMode) -> Self {
        Self {
            engine,
            controller: ExecutionController::new(execution_mode),
            registry: QubitRegistry::new(),
            metadata_buffer: GrowableBuffer::with_capacity(METADATA_BUFFER_CAPACITY),
            instructions_buffer: GrowableBuffer::with_capacity(INSTRUCTIONS_BUFFER_CAPACITY),
        }
    }

    /// Force a flush of all queued instructions.
    pub(crate) fn execute(&mut self) -> RuntimeResult<()> {
        self.controller.ensure_accepting()?;
        self.engine.prepare_for_execution()?;
        self.controller.record_flush();
        tracing::debug!(mode = ?self.controller.execution_mode(), "process_executed");
        Ok(())
    }

    pub(crate) fn metadata(&mut self) -> RuntimeResult<ExecutionMetadata> {
        let engine = &self.engine;
        let payload = self
            .metadata_buffer
            .retrieve(|buffer| engine.metadata_json(buffer))?;
        serde_json::from_slice(payload).map_err(|e| RuntimeError::PayloadDecode(e.to_string()))
    }

    pub(crate) fn instructions(&mut self) -> RuntimeResult<Vec<InstructionRecord>> {
        let engine = &self.engine;
        let payload = self
            .instructions_buffer
            .retrieve(|buffer| engine.instructions_json(buffer))?;
        serde_json::from_slice(payload).map_err(|e| RuntimeError::PayloadDecode(e.to_string()))
    }
}

// =============================================================================
// 3. QuantumProcess
// =============================================================================

/// Quantum program process: the exclusive owner of an execution engine, the
/// qubit index space, and the flush state machine. Dropping the process
/// invalidates every `QubitGroup` and deferred result that references it.
pub struct QuantumProcess {
    process_id: Uuid,
    configuration: ProcessConfiguration,
    core: SharedProcessCore,
}

impl QuantumProcess {
    /// Create a process over the given engine. The configuration is fixed
    /// for the lifetime of the process.
    pub fn new(engine: Box<dyn ExecutionEngine>, configuration: ProcessConfiguration) -> Self {
        let process_id = Uuid::new_v4();
        tracing::info!(
            process_id = %process_id,
            mode = ?configuration.execution_mode,
            qubit_capacity = configuration.qubit_capacity,
            "process_created"
        );
        Self {
            process_id,
            configuration,
            core: Arc::new(RwLock::new(ProcessCore::new(
                engine,
                configuration.execution_mode,
            ))),
        }
    }

    /// Create a process backed by the deterministic reference engine.
    pub fn with_reference_engine(configuration: ProcessConfiguration) -> Self {
        let engine_mode = match configuration.execution_mode {
            ExecutionMode::Live => EngineExecutionMode::Live,
            ExecutionMode::Batch => EngineExecutionMode::Batch,
        };
        let mut engine = ReferenceEngine::new(configuration.qubit_capacity, engine_mode);
        if let Some(timeout) = configuration.timeout {
            engine = engine.with_timeout(timeout);
        }
        Self::new(Box::new(engine), configuration)
    }

    /// Create a reference-engine process from the application-wide default
    /// configuration context.
    pub fn with_default_configuration() -> Self {
        Self::with_reference_engine(default_configuration())
    }

    pub fn id(&self) -> Uuid {
        self.process_id
    }

    pub fn configuration(&self) -> ProcessConfiguration {
        self.configuration
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.configuration.execution_mode
    }

    pub fn is_executed(&self) -> bool {
        self.core.read().controller.is_executed()
    }

    pub(crate) fn core_handle(&self) -> WeakProcessCore {
        Arc::downgrade(&self.core)
    }

    /// Allocate `qubit_count` fresh qubits as one group.
    pub fn allocate(&self, qubit_count: usize) -> RuntimeResult<QubitGroup> {
        if qubit_count < 1 {
            return Err(RuntimeError::InvalidAllocation {
                requested: qubit_count,
            });
        }

        let mut core = self.core.write();
        core.controller.ensure_accepting()?;

        let mut qubits = Vec::with_capacity(qubit_count);
        for _ in 0..qubit_count {
            let qubit = core.engine.allocate_qubit()?;
            core.registry.record_allocation(qubit);
            qubits.push(qubit);
        }
        tracing::debug!(
            process_id = %self.process_id,
            qubits = ?qubits.iter().map(QubitId::index).collect::<Vec<_>>(),
            "qubits_allocated"
        );

        Ok(QubitGroup::from_parts(
            self.core_handle(),
            self.process_id,
            qubits,
        ))
    }

    /// Force the execution of the quantum program. In live mode this
    /// finalizes metadata; in batch mode it is the only way to obtain
    /// concrete values and it is terminal.
    pub fn execute(&self) -> RuntimeResult<()> {
        self.core.write().execute()
    }

    /// Execution metadata, retrieved through the growing-buffer protocol.
    /// Available in any state; `execution_time` is only present after
    /// `execute`.
    pub fn metadata(&self) -> RuntimeResult<ExecutionMetadata> {
        self.core.write().metadata()
    }

    /// The instruction log, retrieved through the growing-buffer protocol.
    pub fn instructions(&self) -> RuntimeResult<Vec<InstructionRecord>> {
        self.core.write().instructions()
    }
}

impl std::fmt::Debug for QuantumProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuantumProcess")
            .field("process_id", &self.process_id)
            .field("configuration", &self.configuration)
            .finish()
    }
}
