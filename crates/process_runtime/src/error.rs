// =============================================================================
// Quantum Process Runtime - Error Taxonomy
// =============================================================================
// Table of Contents:
//   1. RuntimeError - User-visible failure kinds
//   2. RuntimeResult - Result type alias
// =============================================================================
// Purpose: Every user-visible failure is a distinguishable kind so calling
//          code can branch on it. Buffer regrowth never surfaces here; engine
//          query failures propagate unmodified with no automatic retry.
// =============================================================================

use engine_interface::contract::EngineError;
use thiserror::Error;

// =============================================================================
// 1. RuntimeError
// =============================================================================

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Cannot allocate {requested} qubits: at least 1 is required")]
    InvalidAllocation { requested: usize },

    #[error("Operation mixes qubits from different processes")]
    CrossProcess,

    #[error("Process has already executed: no further instructions may be queued")]
    ProcessAlreadyExecuted,

    #[error("Qubit group left scope with non-free qubits: {qubits:?}")]
    ScopeLeak { qubits: Vec<usize> },

    #[error("Engine query failed: {0}")]
    EngineQuery(#[from] EngineError),

    #[error("Process was released while handles to it were still live")]
    ProcessReleased,

    #[error(
        "Engine contract violation: payload of {reported} bytes reported after regrowth to {capacity}"
    )]
    EngineContractViolation { reported: usize, capacity: usize },

    #[error("Register of {qubits} qubits exceeds the {max_width}-bit logical value width")]
    RegisterTooWide { qubits: usize, max_width: usize },

    #[error("Group position {position} out of bounds for group of {length} qubits")]
    PositionOutOfBounds { position: usize, length: usize },

    #[error("Malformed state format string: {0}")]
    MalformedFormat(String),

    #[error("Payload decoding failed: {0}")]
    PayloadDecode(String),
}

// =============================================================================
// 2. RuntimeResult
// =============================================================================

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinguishable() {
        let err = RuntimeError::InvalidAllocation { requested: 0 };
        assert!(matches!(err, RuntimeError::InvalidAllocation { .. }));
        assert!(err.to_string().contains("0"));

        let err: RuntimeError = EngineError::QueryFailed("boom".into()).into();
        assert!(matches!(err, RuntimeError::EngineQuery(_)));
    }

    #[test]
    fn test_scope_leak_reports_qubits() {
        let err = RuntimeError::ScopeLeak { qubits: vec![2, 5] };
        assert!(err.to_string().contains("[2, 5]"));
    }
}
