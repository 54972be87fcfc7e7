//! Pointer chain resolution.
//!
//! A chain starts at a stable absolute address (module base plus a
//! configured displacement) and walks a list of offsets. Each step
//! dereferences the current address and then adds the step's offset; the
//! address left after the final add is the address of the value of
//! interest and is never dereferenced itself.

use crate::error::{Error, Result};
use crate::memory::ReadMemory;

/// An ordered pointer chain anchored at an absolute start address.
#[derive(Debug, Clone)]
pub struct PointerChain {
    base: u64,
    offsets: Vec<u64>,
}

impl PointerChain {
    pub fn new(base: u64) -> Self {
        Self {
            base,
            offsets: Vec::new(),
        }
    }

    /// Append one offset to the chain.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offsets.push(offset);
        self
    }

    /// Append several offsets, preserving order.
    pub fn offsets(mut self, offsets: &[u64]) -> Self {
        self.offsets.extend_from_slice(offsets);
        self
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Walk the chain: one dereference and one add per offset.
    ///
    /// Fails with [`Error::NullPointer`] as soon as the address to
    /// dereference, or a dereferenced value, is zero; later offsets are
    /// not processed. The target structure is simply not allocated yet in
    /// that case (loading screen, match restart), so callers treat this
    /// like any transient read fault.
    pub fn resolve<R: ReadMemory + ?Sized>(&self, reader: &R) -> Result<u64> {
        let mut current = self.base;
        for (step, offset) in self.offsets.iter().enumerate() {
            if current == 0 {
                return Err(Error::NullPointer { step });
            }
            let pointee = reader.read_ptr(current)?;
            if pointee == 0 {
                return Err(Error::NullPointer { step });
            }
            current = pointee.wrapping_add(*offset);
        }
        Ok(current)
    }
}
