use crate::constants::ROOT_FRAME;
use crate::geometry::Geometry;
use crate::memory::{PhysicalMemory, Word};
use crate::translation::{self, VirtualAddress};

/// The only user-visible failure: everything else (page faults,
/// evictions, restores) is resolved internally and never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    #[error("virtual address {address} is outside the {size}-word virtual memory")]
    AddressOutOfRange { address: u64, size: u64 },
}

/// Counters for the internal traffic a read/write stream generates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Missing table entries resolved by the allocator.
    pub page_faults: u64,
    /// Faults served by detaching an already-zeroed frame.
    pub reclaimed_frames: u64,
    /// Faults served by a never-before-used frame index.
    pub fresh_frames: u64,
    /// Faults served by evicting a resident page.
    pub evictions: u64,
    /// Data-leaf preparations (backing-store reads, zeros if unknown).
    pub restores: u64,
}

/// One flat virtual address space translated through one page-table tree
/// over a fixed set of physical frames.
pub struct VirtualMemory {
    geometry: Geometry,
    pm: PhysicalMemory,
    stats: Stats,
}

impl VirtualMemory {
    pub fn new(geometry: Geometry) -> Self {
        let pm = PhysicalMemory::new(&geometry);
        let mut vm = VirtualMemory {
            geometry,
            pm,
            stats: Stats::default(),
        };
        vm.initialize();
        vm
    }

    /// Reset the simulated state: zero the root table, drop all
    /// backing-store content, zero the counters.
    ///
    /// Only frame 0 needs clearing; every other frame is free by the
    /// all-zero-is-free convention once nothing reachable points at it.
    pub fn initialize(&mut self) {
        self.pm.clear_frame(ROOT_FRAME);
        self.pm.clear_store();
        self.stats = Stats::default();
    }

    /// Read the word at `address`, faulting its page in if necessary.
    pub fn read(&mut self, address: u64) -> Result<Word, VmError> {
        self.check_range(address)?;
        let va = VirtualAddress::from_raw(address, &self.geometry);
        let frame = translation::walk(&mut self.pm, &self.geometry, va.page, &mut self.stats);
        Ok(self.pm.read(self.pm.frame_base(frame) + va.offset as usize))
    }

    /// Write `value` at `address`, faulting its page in if necessary.
    pub fn write(&mut self, address: u64, value: Word) -> Result<(), VmError> {
        self.check_range(address)?;
        let va = VirtualAddress::from_raw(address, &self.geometry);
        let frame = translation::walk(&mut self.pm, &self.geometry, va.page, &mut self.stats);
        self.pm
            .write(self.pm.frame_base(frame) + va.offset as usize, value);
        Ok(())
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// The underlying adapter, for inspection.
    pub fn memory(&self) -> &PhysicalMemory {
        &self.pm
    }

    fn check_range(&self, address: u64) -> Result<(), VmError> {
        let size = self.geometry.virtual_memory_size();
        if address >= size {
            return Err(VmError::AddressOutOfRange { address, size });
        }
        Ok(())
    }
}

impl Default for VirtualMemory {
    fn default() -> Self {
        VirtualMemory::new(Geometry::default())
    }
}
