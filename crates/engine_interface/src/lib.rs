// =============================================================================
// Quantum Process Runtime - Engine Interface
// =============================================================================
// Table of Contents:
//   1. Module Declarations
//   2. Prelude Module
// =============================================================================
// Purpose: Narrow contract between the process runtime and whatever executes
//          the quantum program. The runtime sees a trait, typed result
//          handles, a serialized instruction log, and an execution metadata
//          record; everything behind the trait is opaque.
// =============================================================================

pub mod contract;
pub mod instruction;
pub mod metadata;
pub mod reference_engine;

pub mod prelude {
    pub use crate::contract::*;
    pub use crate::instruction::*;
    pub use crate::metadata::*;
    pub use crate::reference_engine::*;
}
