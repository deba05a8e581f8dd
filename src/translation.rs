use log::{debug, trace};

use crate::allocator;
use crate::constants::ROOT_FRAME;
use crate::geometry::Geometry;
use crate::memory::{PhysicalMemory, Word};
use crate::vm::Stats;

/// Represents the decomposed components of a virtual address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAddress {
    pub raw: u64,
    pub page: u64,
    pub offset: u64,
}

impl VirtualAddress {
    /// Decompose a raw virtual address into page number and in-page offset
    pub fn from_raw(raw: u64, geometry: &Geometry) -> Self {
        let page = raw >> geometry.offset_width();
        let offset = raw & geometry.offset_mask();

        VirtualAddress { raw, page, offset }
    }

    /// The table index used at `depth` while descending for this address
    #[inline]
    pub fn table_index(&self, depth: u32, geometry: &Geometry) -> usize {
        table_index(self.page, depth, geometry)
    }
}

impl std::fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "VA({}) = (page={}, offset={})",
            self.raw, self.page, self.offset
        )
    }
}

/// Index field of `page` consumed at table level `depth` (most-significant
/// field first).
#[inline]
pub fn table_index(page: u64, depth: u32, geometry: &Geometry) -> usize {
    let shift = geometry.offset_width() * (geometry.tables_depth() - depth - 1);
    ((page >> shift) & geometry.offset_mask()) as usize
}

/// Descend the page-table tree for `page` and return the data frame
/// holding it, faulting missing entries in through the allocator.
///
/// The caller guarantees `page < num_pages`; the facade rejects
/// out-of-range addresses before translation is ever attempted.
pub fn walk(
    pm: &mut PhysicalMemory,
    geometry: &Geometry,
    page: u64,
    stats: &mut Stats,
) -> usize {
    let mut current = ROOT_FRAME;
    // Frames on the in-progress path, root inclusive. Passed to the
    // allocator so it never hands back an ancestor of the entry being
    // extended.
    let mut path = Vec::with_capacity(geometry.tables_depth() as usize + 1);
    path.push(current);

    for depth in 0..geometry.tables_depth() {
        let index = table_index(page, depth, geometry);
        let entry = pm.entry(current, index);
        let next = if entry != 0 {
            trace!("level {depth}: frame {current}[{index}] -> frame {entry}");
            entry as usize
        } else {
            debug!("page fault: page {page}, level {depth}, frame {current}[{index}]");
            stats.page_faults += 1;
            let frame = allocator::allocate(pm, geometry, page, depth, current, index, &path, stats);
            assert_eq!(
                pm.entry(current, index),
                frame as Word,
                "allocator left frame {current}[{index}] pointing elsewhere"
            );
            frame
        };
        path.push(next);
        current = next;
    }

    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> Geometry {
        Geometry::new(2, 2, 6).unwrap()
    }

    #[test]
    fn test_va_decomposition() {
        let g = geometry();
        // 0b000101: page 1, offset 1
        let va = VirtualAddress::from_raw(5, &g);
        assert_eq!(va.page, 1);
        assert_eq!(va.offset, 1);

        // 0b100101: page 9, offset 1
        let va = VirtualAddress::from_raw(37, &g);
        assert_eq!(va.page, 9);
        assert_eq!(va.offset, 1);
    }

    #[test]
    fn test_va_decomposition_default_geometry() {
        let g = Geometry::default();
        let va = VirtualAddress::from_raw(789_002, &g);
        assert_eq!(va.page, 789_002 >> 4);
        assert_eq!(va.offset, 789_002 & 0xF);
    }

    #[test]
    fn test_va_reconstruction() {
        let g = geometry();
        for raw in [0u64, 5, 21, 37, 63] {
            let va = VirtualAddress::from_raw(raw, &g);
            assert_eq!((va.page << g.offset_width()) | va.offset, raw);
        }
    }

    #[test]
    fn test_table_index_fields_msb_first() {
        let g = geometry();
        // page 9 = 0b1001: top field 2, bottom field 1
        assert_eq!(table_index(9, 0, &g), 2);
        assert_eq!(table_index(9, 1, &g), 1);

        let va = VirtualAddress::from_raw(37, &g);
        assert_eq!(va.table_index(0, &g), 2);
        assert_eq!(va.table_index(1, &g), 1);
    }

    #[test]
    fn test_display() {
        let g = geometry();
        let va = VirtualAddress::from_raw(37, &g);
        let display = format!("{}", va);
        assert!(display.contains("37"));
        assert!(display.contains("page=9"));
        assert!(display.contains("offset=1"));
    }

    #[test]
    fn test_walk_builds_path_for_fresh_page() {
        let g = geometry();
        let mut pm = PhysicalMemory::new(&g);
        let mut stats = Stats::default();

        let frame = walk(&mut pm, &g, 0, &mut stats);

        // root -> table frame 1 -> data frame 2
        assert_eq!(frame, 2);
        assert_eq!(pm.entry(0, 0), 1);
        assert_eq!(pm.entry(1, 0), 2);
        assert_eq!(stats.page_faults, 2);
    }

    #[test]
    fn test_walk_is_stable_once_mapped() {
        let g = geometry();
        let mut pm = PhysicalMemory::new(&g);
        let mut stats = Stats::default();

        let first = walk(&mut pm, &g, 3, &mut stats);
        let faults = stats.page_faults;
        let second = walk(&mut pm, &g, 3, &mut stats);

        assert_eq!(first, second);
        assert_eq!(stats.page_faults, faults);
    }

    #[test]
    fn test_walk_shares_interior_tables() {
        let g = geometry();
        let mut pm = PhysicalMemory::new(&g);
        let mut stats = Stats::default();

        // pages 0 and 1 share the top-level field, so one interior table
        let a = walk(&mut pm, &g, 0, &mut stats);
        // make page 0 resident-with-content, else its zeroed leaf is free
        // for the next fault to reclaim
        let base = pm.frame_base(a);
        pm.write(base, 9);
        let b = walk(&mut pm, &g, 1, &mut stats);

        assert_ne!(a, b);
        assert_eq!(stats.page_faults, 3);
        assert_eq!(pm.entry(0, 0) as usize, 1);
        assert_eq!(pm.entry(1, 0) as usize, a);
        assert_eq!(pm.entry(1, 1) as usize, b);
    }
}
