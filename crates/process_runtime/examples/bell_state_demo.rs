// =============================================================================
// Quantum Process Runtime - Bell State Demo
// =============================================================================
// Table of Contents:
//   1. Process creation in batch mode
//   2. Circuit construction over a qubit group
//   3. Deferred result requests (measure / snapshot / sample)
//   4. Forced execution and result resolution
//   5. Metadata and instruction log inspection
// =============================================================================
// Purpose: Demonstrates the complete batch workflow: allocate qubits, issue
//          gates, request deferred results, then let the first `get` force
//          the single terminal flush and resolve everything at once.
// =============================================================================

use process_runtime::prelude::*;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║          Quantum Process Runtime - Bell State Demo               ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    // =========================================================================
    // 1. Create a batch process over the reference engine
    // =========================================================================
    println!("📐 Step 1: Creating batch quantum_process");
    println!();

    // The reference engine tracks basis states only; the Bell superposition
    // below is staged as raw amplitude records the way a real engine would
    // report them.
    let mut engine = ReferenceEngine::batch(8);
    engine.stage_snapshot_records(vec![
        SnapshotRecord {
            basis_chunks: vec![0b00],
            amplitude_real: std::f64::consts::FRAC_1_SQRT_2,
            amplitude_imag: 0.0,
        },
        SnapshotRecord {
            basis_chunks: vec![0b11],
            amplitude_real: std::f64::consts::FRAC_1_SQRT_2,
            amplitude_imag: 0.0,
        },
    ]);
    engine.stage_measurement_value(0b11);
    let mut staged_counts = std::collections::BTreeMap::new();
    staged_counts.insert(0b00u128, 507u64);
    staged_counts.insert(0b11u128, 517u64);
    engine.stage_sample_histogram(SampleHistogram {
        counts: staged_counts,
    });

    let process = QuantumProcess::new(Box::new(engine), ProcessConfiguration::batch(8));
    println!("   Process ID: {}", process.id());
    println!("   Execution mode: {:?}", process.execution_mode());
    println!();

    // =========================================================================
    // 2. Build the Bell circuit
    // =========================================================================
    println!("⚡ Step 2: Building the Bell circuit");
    println!();

    let pair = process.allocate(2).unwrap();
    let first = pair.index(0).unwrap();
    let second = pair.index(1).unwrap();
    first.apply(GateKind::Hadamard).unwrap();
    second
        .apply_controlled(GateKind::PauliX, &first)
        .unwrap();
    println!("   Allocated qubits: {:?}", pair.qubit_indices());
    println!();

    // =========================================================================
    // 3. Request deferred results
    // =========================================================================
    println!("⏳ Step 3: Requesting deferred results");
    println!();

    let mut state = QuantumState::request(&pair).unwrap();
    let mut samples = Samples::request(&pair, 1024).unwrap();
    let mut measurement = Measurement::request(&pair).unwrap();

    println!("   measurement.value() before flush: {:?}", measurement.value().unwrap());
    println!("   state.states() before flush:      {:?}", state.states().unwrap());
    println!("   process executed:                 {}", process.is_executed());
    println!();

    // =========================================================================
    // 4. Resolve: the first get() forces the terminal flush
    // =========================================================================
    println!("🎲 Step 4: Resolving results");
    println!();

    let measured = measurement.get().unwrap();
    println!("   Measured value: {measured:#04b}");
    println!("   Process executed: {}", process.is_executed());
    println!();

    println!("   Quantum state:");
    for line in state.show(Some("b2")).unwrap().lines() {
        println!("     {line}");
    }
    println!();

    println!("   Sample histogram (1024 shots):");
    for (label, count) in samples.get().unwrap() {
        let bar = "█".repeat((count / 16) as usize);
        println!("     |{label:02b}⟩: {count:4} {bar}");
    }
    println!();

    // =========================================================================
    // 5. Metadata and instruction log
    // =========================================================================
    println!("📊 Step 5: Execution metadata");
    println!();

    let metadata = process.metadata().unwrap();
    println!("   Depth: {}", metadata.depth);
    println!("   Gate counts by arity: {:?}", metadata.gate_count);
    println!("   Simultaneous qubits: {}", metadata.qubit_simultaneous);
    println!("   Status: {:?}", metadata.status);
    if let Some(execution_time) = metadata.execution_time {
        println!("   Execution time: {execution_time:.6}s");
    }
    println!();

    let instructions = process.instructions().unwrap();
    println!("   Instruction log ({} records):", instructions.len());
    for record in &instructions {
        println!("     {record:?}");
    }
    println!();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                        Demo Complete                             ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
}
