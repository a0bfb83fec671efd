// =============================================================================
// Quantum Process Runtime - Execution Metadata
// =============================================================================
// Table of Contents:
//   1. ExecutionStatus - Engine-reported program status
//   2. ExecutionMetadata - Circuit and execution statistics record
// =============================================================================
// Purpose: The metadata record retrieved through the growing-buffer protocol.
//          Available in any execution state; `execution_time` is only
//          meaningful once the program has executed.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// 1. ExecutionStatus
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Live mode: instructions dispatch immediately.
    Live,
    /// Batch mode, not yet flushed.
    Batch,
    /// Terminal: the program has executed.
    Completed,
}

// =============================================================================
// 2. ExecutionMetadata
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Circuit depth: longest per-qubit chain of gate applications.
    pub depth: usize,
    /// Gate counts keyed by arity (controls plus target).
    pub gate_count: BTreeMap<usize, usize>,
    /// Maximum number of simultaneously allocated qubits.
    pub qubit_simultaneous: usize,
    pub status: ExecutionStatus,
    /// Wall-clock execution time in seconds; present only post-execution.
    pub execution_time: Option<f64>,
    /// Optional engine-enforced timeout in seconds.
    pub timeout: Option<u64>,
}

impl ExecutionMetadata {
    pub fn new(status: ExecutionStatus) -> Self {
        Self {
            depth: 0,
            gate_count: BTreeMap::new(),
            qubit_simultaneous: 0,
            status,
            execution_time: None,
            timeout: None,
        }
    }

    pub fn total_gate_count(&self) -> usize {
        self.gate_count.values().sum()
    }

    pub fn has_executed(&self) -> bool {
        matches!(self.status, ExecutionStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_json_keys() {
        let mut metadata = ExecutionMetadata::new(ExecutionStatus::Live);
        metadata.depth = 2;
        metadata.gate_count.insert(1, 1);
        metadata.gate_count.insert(2, 1);
        metadata.qubit_simultaneous = 2;

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["depth"], 2);
        assert_eq!(json["gate_count"]["1"], 1);
        assert_eq!(json["gate_count"]["2"], 1);
        assert_eq!(json["qubit_simultaneous"], 2);
        assert_eq!(json["status"], "Live");
        assert!(json["execution_time"].is_null());
    }

    #[test]
    fn test_metadata_round_trip() {
        let mut metadata = ExecutionMetadata::new(ExecutionStatus::Completed);
        metadata.execution_time = Some(0.0042);
        metadata.gate_count.insert(1, 3);

        let json = serde_json::to_string(&metadata).unwrap();
        let decoded: ExecutionMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, metadata);
        assert!(decoded.has_executed());
        assert_eq!(decoded.total_gate_count(), 3);
    }
}
