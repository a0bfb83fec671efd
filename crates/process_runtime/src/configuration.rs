// =============================================================================
// Quantum Process Runtime - Process Configuration
// =============================================================================
// Table of Contents:
//   1. ExecutionMode - Live vs. batch dispatch
//   2. ProcessConfiguration - Immutable per-process settings
//   3. Default configuration context - Explicitly owned application default
// =============================================================================
// Purpose: Configuration is an explicit struct passed at construction. The
//          process-wide default lives in a context the owning application
//          initializes and tears down explicitly; constructing a process from
//          the default without initializing the context is an error in the
//          caller, answered with the built-in defaults.
// =============================================================================

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// =============================================================================
// 1. ExecutionMode
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Every queued instruction is dispatched to the engine immediately.
    Live,
    /// Instructions accumulate until a flush is forced.
    Batch,
}

// =============================================================================
// 2. ProcessConfiguration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessConfiguration {
    pub execution_mode: ExecutionMode,
    /// Number of qubits the backing engine is provisioned for.
    pub qubit_capacity: usize,
    /// Optional engine-enforced timeout in seconds.
    pub timeout: Option<u64>,
}

impl Default for ProcessConfiguration {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::Live,
            qubit_capacity: 32,
            timeout: None,
        }
    }
}

impl ProcessConfiguration {
    pub fn live(qubit_capacity: usize) -> Self {
        Self {
            execution_mode: ExecutionMode::Live,
            qubit_capacity,
            timeout: None,
        }
    }

    pub fn batch(qubit_capacity: usize) -> Self {
        Self {
            execution_mode: ExecutionMode::Batch,
            qubit_capacity,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout = Some(timeout_seconds);
        self
    }
}

// =============================================================================
// 3. Default configuration context
// =============================================================================

static DEFAULT_CONFIGURATION: RwLock<Option<ProcessConfiguration>> = RwLock::new(None);

/// Install the application-wide default process configuration.
pub fn initialize_default_configuration(configuration: ProcessConfiguration) {
    *DEFAULT_CONFIGURATION.write() = Some(configuration);
}

/// Tear down the application-wide default, restoring the built-in defaults.
pub fn reset_default_configuration() {
    *DEFAULT_CONFIGURATION.write() = None;
}

/// The configuration new processes use when none is passed explicitly.
pub fn default_configuration() -> ProcessConfiguration {
    (*DEFAULT_CONFIGURATION.read()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults() {
        let configuration = ProcessConfiguration::default();
        assert_eq!(configuration.execution_mode, ExecutionMode::Live);
        assert_eq!(configuration.qubit_capacity, 32);
        assert!(configuration.timeout.is_none());
    }

    #[test]
    fn test_timeout_builder() {
        let configuration = ProcessConfiguration::batch(8).with_timeout(60);
        assert_eq!(configuration.execution_mode, ExecutionMode::Batch);
        assert_eq!(configuration.timeout, Some(60));
    }

    // The install/teardown path of the default-configuration context is
    // covered by the process tests; only one test may touch the global.
}
