use log::debug;

use crate::constants::ROOT_FRAME;
use crate::geometry::Geometry;
use crate::memory::{PhysicalMemory, Word};
use crate::vm::Stats;

/// Ring-wrapped distance between two page numbers.
///
/// The page space is treated as a ring so the eviction policy has no
/// bias toward pages at the numeric extremes.
#[inline]
pub fn cyclic_distance(p: u64, q: u64, num_pages: u64) -> u64 {
    let diff = p.abs_diff(q);
    diff.min(num_pages - diff)
}

/// A fully-zeroed frame that can be detached from its parent and reused
/// without any I/O.
#[derive(Debug, Clone, Copy)]
struct Reusable {
    frame: usize,
    /// Physical address of the parent entry pointing at this frame.
    parent_entry: usize,
}

/// A resident data page that could be evicted to make room.
#[derive(Debug, Clone, Copy)]
struct Victim {
    frame: usize,
    page: u64,
    parent_entry: usize,
    distance: u64,
}

/// Everything one pass over the table tree learns, merged bottom-up from
/// the recursive calls so no traversal state leaks between subtrees.
#[derive(Debug)]
struct FrameSurvey {
    reusable: Option<Reusable>,
    max_visited: usize,
    victim: Option<Victim>,
}

impl FrameSurvey {
    fn absorb(&mut self, child: FrameSurvey) {
        // First candidate in pre-order wins
        if self.reusable.is_none() {
            self.reusable = child.reusable;
        }
        self.max_visited = self.max_visited.max(child.max_visited);
        match (&self.victim, child.victim) {
            (None, found) => self.victim = found,
            // Ties keep the candidate found first
            (Some(best), Some(found)) if found.distance > best.distance => {
                self.victim = Some(found)
            }
            _ => {}
        }
    }
}

/// Depth-first pre-order walk of the whole tree, lowest child index
/// first. `page_prefix` accumulates the index fields seen on the way
/// down; at leaf depth it is the frame's virtual page number.
fn survey_tree(
    pm: &PhysicalMemory,
    geometry: &Geometry,
    target_page: u64,
    protected: &[usize],
    frame: usize,
    depth: u32,
    page_prefix: u64,
    parent_entry: Option<usize>,
) -> FrameSurvey {
    let mut result = FrameSurvey {
        reusable: None,
        max_visited: frame,
        victim: None,
    };

    // Ancestors of the entry being extended are legitimately all-zero
    // while their subtree is under construction; the root never counts.
    if let Some(parent_entry) = parent_entry {
        if !protected.contains(&frame) && pm.is_frame_zeroed(frame) {
            result.reusable = Some(Reusable {
                frame,
                parent_entry,
            });
        }
    }

    if depth == geometry.tables_depth() {
        result.victim = Some(Victim {
            frame,
            page: page_prefix,
            parent_entry: parent_entry.expect("data frame reached without a parent entry"),
            distance: cyclic_distance(page_prefix, target_page, geometry.num_pages()),
        });
        return result;
    }

    for index in 0..geometry.page_size() {
        let entry = pm.entry(frame, index);
        if entry == 0 {
            continue;
        }
        let child = survey_tree(
            pm,
            geometry,
            target_page,
            protected,
            entry as usize,
            depth + 1,
            (page_prefix << geometry.offset_width()) | index as u64,
            Some(pm.frame_base(frame) + index),
        );
        result.absorb(child);
    }

    result
}

/// Produce a frame for the missing entry `parent_frame[parent_index]`
/// encountered at `depth` while translating `page`, write it into that
/// entry, and prepare its content for the role it is about to play.
///
/// Selection runs three tiers in priority order:
/// 1. a fully-zeroed, non-root frame off the active path (detached from
///    its old parent, no I/O);
/// 2. the next never-used frame index, if any remain;
/// 3. eviction of the resident data page with maximum cyclic distance to
///    `page`.
///
/// `path` is the list of frames on the walk currently being extended,
/// root inclusive; none of them may be produced.
///
/// Always succeeds: eviction guarantees forward progress. Finding no
/// candidate in any tier means the tree itself is corrupt, which panics.
pub fn allocate(
    pm: &mut PhysicalMemory,
    geometry: &Geometry,
    page: u64,
    depth: u32,
    parent_frame: usize,
    parent_index: usize,
    path: &[usize],
    stats: &mut Stats,
) -> usize {
    let survey = survey_tree(pm, geometry, page, path, ROOT_FRAME, 0, 0, None);

    let frame = if let Some(found) = survey.reusable {
        debug!("reusing zeroed frame {}", found.frame);
        stats.reclaimed_frames += 1;
        pm.write(found.parent_entry, 0);
        found.frame
    } else if survey.max_visited + 1 < geometry.num_frames() {
        let frame = survey.max_visited + 1;
        debug!("taking untouched frame {frame}");
        stats.fresh_frames += 1;
        frame
    } else {
        let victim = survey
            .victim
            .expect("no eviction candidate although physical memory is full");
        assert!(
            !path.contains(&victim.frame),
            "eviction selected frame {} on the active path",
            victim.frame
        );
        debug!(
            "evicting page {} from frame {} (distance {})",
            victim.page, victim.frame, victim.distance
        );
        stats.evictions += 1;
        pm.evict(victim.frame, victim.page);
        pm.write(victim.parent_entry, 0);
        victim.frame
    };

    if depth < geometry.tables_depth() - 1 {
        // The frame becomes an interior table
        pm.clear_frame(frame);
    } else {
        // The frame becomes the data leaf for `page`
        stats.restores += 1;
        pm.restore(frame, page);
    }
    pm.set_entry(parent_frame, parent_index, frame as Word);

    frame
}
