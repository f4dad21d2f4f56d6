use crate::pileup::PosData;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;

/// How to resolve overlapping mates of a paired-end fragment that cover the
/// same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MateOverlap {
    /// On disagreement, drop both mate bases at the locus; there is no way to
    /// tell which mate is wrong.
    Drop,
    /// Always keep the base that was read first, even on disagreement. Under
    /// this policy active reads are no longer guaranteed to have strictly
    /// increasing positions.
    KeepFirst,
}

impl FromStr for MateOverlap {
    type Err = &'static str;
    fn from_str(policy: &str) -> Result<Self, Self::Err> {
        match policy {
            "drop" => Ok(MateOverlap::Drop),
            "keep-first" => Ok(MateOverlap::KeepFirst),
            _ => Err("Invalid mate-overlap policy"),
        }
    }
}

/// A read being reassembled from consecutive pileup records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub cell_id: u32,
    /// Position at which the read first appeared. Usually `positions[0]`,
    /// except when the first base was discarded by mate-overlap handling.
    pub start: u32,
    /// Positions carrying the bases below; only retained positions appear,
    /// so the sequence is not necessarily contiguous.
    pub positions: Vec<u32>,
    pub bases: Vec<u8>,
}

/// Sliding window of reads that may still overlap future positions.
///
/// A read is active while `current_position - start < max_fragment_length`;
/// once the stream has moved past that span the read is complete and only
/// waits to be compared against the rest of the window.
pub struct ReadWindow {
    max_fragment_length: u32,
    mate_overlap: MateOverlap,
    active_reads: HashMap<u32, Read>,
    /// Read ids in order of first appearance.
    active_keys: VecDeque<u32>,
    /// Number of leading entries of `active_keys` whose reads are complete.
    completed: usize,
}

impl ReadWindow {
    pub fn new(max_fragment_length: u32, mate_overlap: MateOverlap) -> ReadWindow {
        ReadWindow {
            max_fragment_length,
            mate_overlap,
            active_reads: HashMap::new(),
            active_keys: VecDeque::new(),
            completed: 0,
        }
    }

    pub fn active_reads(&self) -> &HashMap<u32, Read> {
        &self.active_reads
    }

    pub fn active_keys(&self) -> &VecDeque<u32> {
        &self.active_keys
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn len(&self) -> usize {
        self.active_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_keys.is_empty()
    }

    /// Advances the completion watermark: counts every leading read whose
    /// full fragment lies behind `position`.
    pub fn advance(&mut self, position: u32) {
        while self.completed < self.active_keys.len() {
            let read = &self.active_reads[&self.active_keys[self.completed]];
            if read.start + self.max_fragment_length <= position {
                self.completed += 1;
            } else {
                break;
            }
        }
    }

    /// Folds one pileup record into the window.
    pub fn observe(&mut self, pd: &PosData) {
        for cell in &pd.cells {
            match self.active_reads.entry(cell.read_id) {
                Entry::Vacant(entry) => {
                    entry.insert(Read {
                        cell_id: cell.cell_id,
                        start: pd.position,
                        positions: vec![pd.position],
                        bases: vec![cell.base],
                    });
                    self.active_keys.push_back(cell.read_id);
                }
                Entry::Occupied(mut entry) => {
                    let read = entry.get_mut();
                    // two mates of the same fragment covering this position
                    if read.positions.last() == Some(&pd.position) {
                        if self.mate_overlap == MateOverlap::Drop
                            && read.bases.last() != Some(&cell.base)
                        {
                            read.bases.pop();
                            read.positions.pop();
                        }
                        continue;
                    }
                    debug_assert!(read
                        .positions
                        .last()
                        .map_or(true, |&last| last <= pd.position));
                    read.positions.push(pd.position);
                    read.bases.push(cell.base);
                }
            }
        }
    }

    /// Removes the first `count` reads after they have been processed.
    pub fn evict(&mut self, count: usize) {
        for _ in 0..count {
            if let Some(read_id) = self.active_keys.pop_front() {
                self.active_reads.remove(&read_id);
            }
        }
        self.completed = self.completed.saturating_sub(count);
    }

    /// Drops all window state; reads never span chromosomes.
    pub fn clear(&mut self) {
        self.active_reads.clear();
        self.active_keys.clear();
        self.completed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pileup::CellData;

    fn pos(position: u32, observations: &[(u32, u32, u8)]) -> PosData {
        PosData {
            position,
            cells: observations
                .iter()
                .map(|&(cell_id, read_id, base)| CellData {
                    cell_id,
                    read_id,
                    base,
                })
                .collect(),
        }
    }

    #[test]
    fn test_new_read_starts_at_first_observation() {
        let mut window = ReadWindow::new(10, MateOverlap::Drop);
        window.observe(&pos(100, &[(0, 7, 2)]));
        assert_eq!(window.len(), 1);
        let read = &window.active_reads()[&7];
        assert_eq!(read.start, 100);
        assert_eq!(read.positions, vec![100]);
        assert_eq!(read.bases, vec![2]);
        assert_eq!(read.cell_id, 0);
    }

    #[test]
    fn test_read_grows_in_position_order() {
        let mut window = ReadWindow::new(10, MateOverlap::Drop);
        window.observe(&pos(100, &[(0, 7, 0)]));
        window.observe(&pos(102, &[(0, 7, 1)]));
        window.observe(&pos(105, &[(0, 7, 3)]));
        let read = &window.active_reads()[&7];
        assert_eq!(read.positions, vec![100, 102, 105]);
        assert_eq!(read.bases, vec![0, 1, 3]);
        assert!(read.positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_mate_agreement_keeps_one_base() {
        let mut window = ReadWindow::new(10, MateOverlap::Drop);
        window.observe(&pos(100, &[(0, 7, 2), (0, 7, 2)]));
        let read = &window.active_reads()[&7];
        assert_eq!(read.positions, vec![100]);
        assert_eq!(read.bases, vec![2]);
    }

    #[test]
    fn test_mate_disagreement_drops_both() {
        let mut window = ReadWindow::new(10, MateOverlap::Drop);
        window.observe(&pos(100, &[(0, 7, 2)]));
        window.observe(&pos(101, &[(0, 7, 1), (0, 7, 3)]));
        let read = &window.active_reads()[&7];
        // the disputed locus is gone, the first one stays
        assert_eq!(read.positions, vec![100]);
        assert_eq!(read.bases, vec![2]);
        assert_eq!(read.start, 100);
    }

    #[test]
    fn test_mate_disagreement_keep_first_policy() {
        let mut window = ReadWindow::new(10, MateOverlap::KeepFirst);
        window.observe(&pos(101, &[(0, 7, 1), (0, 7, 3)]));
        let read = &window.active_reads()[&7];
        assert_eq!(read.positions, vec![101]);
        assert_eq!(read.bases, vec![1]);
    }

    #[test]
    fn test_completion_watermark() {
        let mut window = ReadWindow::new(5, MateOverlap::Drop);
        window.observe(&pos(100, &[(0, 1, 0)]));
        window.observe(&pos(102, &[(1, 2, 1)]));
        window.advance(104);
        assert_eq!(window.completed(), 0);
        window.advance(105);
        assert_eq!(window.completed(), 1);
        window.advance(107);
        assert_eq!(window.completed(), 2);
    }

    #[test]
    fn test_evict_removes_leading_reads() {
        let mut window = ReadWindow::new(5, MateOverlap::Drop);
        window.observe(&pos(100, &[(0, 1, 0)]));
        window.observe(&pos(101, &[(1, 2, 1)]));
        window.observe(&pos(102, &[(2, 3, 2)]));
        window.advance(106);
        assert_eq!(window.completed(), 2);
        window.evict(window.completed());
        assert_eq!(window.len(), 1);
        assert_eq!(window.completed(), 0);
        assert!(window.active_reads().contains_key(&3));
        // no remaining read is already complete
        window.advance(106);
        assert_eq!(window.completed(), 0);
    }

    #[test]
    fn test_clear() {
        let mut window = ReadWindow::new(5, MateOverlap::Drop);
        window.observe(&pos(100, &[(0, 1, 0)]));
        window.advance(200);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.completed(), 0);
    }
}
