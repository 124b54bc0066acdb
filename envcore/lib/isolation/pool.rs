use std::collections::BTreeSet;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A bounded pool of boundary indices numbered `1..=size`.
///
/// An index stays out of the pool from `acquire` until its owner calls `release`.
#[derive(Debug, Clone)]
pub struct BoundaryPool {
    size: u32,
    in_use: BTreeSet<u32>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl BoundaryPool {
    /// Creates a pool with `size` indices.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            in_use: BTreeSet::new(),
        }
    }

    /// Takes the lowest free index, or `None` if every index is in use.
    pub fn acquire(&mut self) -> Option<u32> {
        let index = (1..=self.size).find(|index| !self.in_use.contains(index))?;
        self.in_use.insert(index);
        Some(index)
    }

    /// Returns an index to the pool. Returns `false` if it was not in use.
    pub fn release(&mut self, index: u32) -> bool {
        self.in_use.remove(&index)
    }

    /// Returns the number of free indices.
    pub fn available(&self) -> usize {
        (self.size as usize).saturating_sub(self.in_use.len())
    }

    /// Returns the indices currently in use, in ascending order.
    pub fn active(&self) -> Vec<u32> {
        self.in_use.iter().copied().collect()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
