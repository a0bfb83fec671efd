// =============================================================================
// Quantum Process Runtime - Instruction Records
// =============================================================================
// Table of Contents:
//   1. GateKind - Opaque gate labels
//   2. InstructionRecord - Tagged union over the instruction log
// =============================================================================
// Purpose: Serialized form of the per-process instruction log. The runtime
//          treats gate semantics as opaque; these records exist for
//          introspection and for interchange with engine tooling. The JSON
//          shape is externally tagged, e.g.
//          {"Gate": {"gate": "Hadamard", "control": [], "target": 0}}.
// =============================================================================

use serde::{Deserialize, Serialize};

// =============================================================================
// 1. GateKind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GateKind {
    Hadamard,
    PauliX,
    PauliY,
    PauliZ,
    RotationX(f64),
    RotationY(f64),
    RotationZ(f64),
    Phase(f64),
}

impl GateKind {
    pub fn gate_name(&self) -> &'static str {
        match self {
            GateKind::Hadamard => "Hadamard",
            GateKind::PauliX => "PauliX",
            GateKind::PauliY => "PauliY",
            GateKind::PauliZ => "PauliZ",
            GateKind::RotationX(_) => "RotationX",
            GateKind::RotationY(_) => "RotationY",
            GateKind::RotationZ(_) => "RotationZ",
            GateKind::Phase(_) => "Phase",
        }
    }
}

// =============================================================================
// 2. InstructionRecord
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionRecord {
    Alloc {
        target: usize,
    },
    Free {
        target: usize,
    },
    Gate {
        gate: GateKind,
        control: Vec<usize>,
        target: usize,
    },
    Measure {
        qubits: Vec<usize>,
        index: usize,
    },
    Dump {
        qubits: Vec<usize>,
        index: usize,
    },
    Sample {
        qubits: Vec<usize>,
        index: usize,
        shots: u64,
    },
}

impl InstructionRecord {
    /// Qubits the instruction touches, in instruction order.
    pub fn touched_qubits(&self) -> Vec<usize> {
        match self {
            InstructionRecord::Alloc { target } | InstructionRecord::Free { target } => {
                vec![*target]
            }
            InstructionRecord::Gate {
                control, target, ..
            } => {
                let mut qubits = control.clone();
                qubits.push(*target);
                qubits
            }
            InstructionRecord::Measure { qubits, .. }
            | InstructionRecord::Dump { qubits, .. }
            | InstructionRecord::Sample { qubits, .. } => qubits.clone(),
        }
    }

    /// Arity of a gate instruction (controls plus target); `None` otherwise.
    pub fn gate_arity(&self) -> Option<usize> {
        match self {
            InstructionRecord::Gate { control, .. } => Some(control.len() + 1),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_record_json_shape() {
        let record = InstructionRecord::Gate {
            gate: GateKind::Hadamard,
            control: vec![],
            target: 0,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Gate": {"gate": "Hadamard", "control": [], "target": 0}})
        );
    }

    #[test]
    fn test_alloc_record_json_shape() {
        let record = InstructionRecord::Alloc { target: 3 };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"Alloc": {"target": 3}}));
    }

    #[test]
    fn test_instruction_round_trip() {
        let records = vec![
            InstructionRecord::Alloc { target: 0 },
            InstructionRecord::Gate {
                gate: GateKind::RotationY(0.5),
                control: vec![0],
                target: 1,
            },
            InstructionRecord::Measure {
                qubits: vec![0, 1],
                index: 0,
            },
            InstructionRecord::Sample {
                qubits: vec![0, 1],
                index: 0,
                shots: 2048,
            },
        ];
        let json = serde_json::to_string(&records).unwrap();
        let decoded: Vec<InstructionRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_touched_qubits_and_arity() {
        let record = InstructionRecord::Gate {
            gate: GateKind::PauliX,
            control: vec![0, 1],
            target: 2,
        };
        assert_eq!(record.touched_qubits(), vec![0, 1, 2]);
        assert_eq!(record.gate_arity(), Some(3));
        assert_eq!(InstructionRecord::Alloc { target: 0 }.gate_arity(), None);
    }
}
