// =============================================================================
// Quantum Process Runtime - Binary Buffer Channel
// =============================================================================
// Table of Contents:
//   1. GrowableBuffer - Caller-owned buffer with bounded regrowth retry
// =============================================================================
// Purpose: Variable-length payload retrieval from the engine. The engine call
//          reports the number of bytes the payload needs; when that exceeds
//          the current capacity the buffer is regrown and the exact same call
//          retried once. One retry is sufficient because the engine reports
//          the exact required size; any subsequent oversize report is an
//          engine contract violation. Partial payloads are never exposed.
// =============================================================================

use crate::error::{RuntimeError, RuntimeResult};
use engine_interface::contract::EngineResult;

// =============================================================================
// 1. GrowableBuffer
// =============================================================================

#[derive(Debug)]
pub struct GrowableBuffer {
    bytes: Vec<u8>,
}

impl GrowableBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Run a size-reporting engine call against this buffer, regrowing and
    /// retrying once when the payload does not fit. Returns exactly the
    /// payload bytes.
    pub fn retrieve<F>(&mut self, mut call: F) -> RuntimeResult<&[u8]>
    where
        F: FnMut(&mut [u8]) -> EngineResult<usize>,
    {
        let reported = call(&mut self.bytes)?;
        if reported <= self.bytes.len() {
            return Ok(&self.bytes[..reported]);
        }

        tracing::debug!(
            reported = reported,
            capacity = self.bytes.len(),
            "buffer_regrown"
        );
        self.bytes.resize(reported + 1, 0);

        let reported = call(&mut self.bytes)?;
        if reported > self.bytes.len() {
            return Err(RuntimeError::EngineContractViolation {
                reported,
                capacity: self.bytes.len(),
            });
        }
        Ok(&self.bytes[..reported])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_interface::contract::EngineError;

    fn payload_call(payload: &[u8]) -> impl FnMut(&mut [u8]) -> EngineResult<usize> + '_ {
        move |buffer| {
            if payload.len() <= buffer.len() {
                buffer[..payload.len()].copy_from_slice(payload);
            }
            Ok(payload.len())
        }
    }

    #[test]
    fn test_payload_fits_first_try() {
        let mut buffer = GrowableBuffer::with_capacity(16);
        let payload = b"{\"depth\":2}";
        let retrieved = buffer.retrieve(payload_call(payload)).unwrap();
        assert_eq!(retrieved, payload);
        assert_eq!(buffer.capacity(), 16);
    }

    #[test]
    fn test_payload_retrieved_after_single_regrowth() {
        let mut buffer = GrowableBuffer::with_capacity(4);
        let payload: Vec<u8> = (0..100u8).collect();
        let retrieved = buffer.retrieve(payload_call(&payload)).unwrap();
        assert_eq!(retrieved, payload.as_slice());
        assert!(buffer.capacity() > payload.len());
    }

    #[test]
    fn test_oversize_after_regrowth_is_contract_violation() {
        let mut buffer = GrowableBuffer::with_capacity(4);
        // A misbehaving engine that always reports more than it was given.
        let result = buffer.retrieve(|bytes| Ok(bytes.len() + 1));
        assert!(matches!(
            result,
            Err(RuntimeError::EngineContractViolation { .. })
        ));
    }

    #[test]
    fn test_engine_error_propagates_without_retry() {
        let mut buffer = GrowableBuffer::with_capacity(4);
        let mut calls = 0;
        let result = buffer.retrieve(|_| {
            calls += 1;
            Err(EngineError::QueryFailed("engine down".into()))
        });
        assert!(matches!(result, Err(RuntimeError::EngineQuery(_))));
        assert_eq!(calls, 1);
    }
}
