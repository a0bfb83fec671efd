// =============================================================================
// Quantum Process Runtime - Process Runtime
// =============================================================================
// Table of Contents:
//   1. Module Declarations
//   2. Prelude Module
// =============================================================================
// Purpose: The process/qubit/deferred-result runtime of a quantum programming
//          front end. Manages qubit lifecycle, live-vs-batch instruction
//          flushing, and lazy resolution of measurement, snapshot, and sample
//          results over an opaque execution engine.
// =============================================================================

pub mod buffer_channel;
pub mod configuration;
pub mod deferred_result;
pub mod error;
pub mod process;
pub mod qubit_group;
pub mod qubit_registry;
pub mod state_decoder;

pub mod prelude {
    pub use crate::buffer_channel::*;
    pub use crate::configuration::*;
    pub use crate::deferred_result::*;
    pub use crate::error::*;
    pub use crate::process::*;
    pub use crate::qubit_group::*;
    pub use crate::qubit_registry::*;
    pub use crate::state_decoder::*;

    pub use engine_interface::prelude::*;
}
