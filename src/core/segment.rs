//! Distal (lateral) segments and the updates queued against them.
//!
//! A segment is a cluster of synapses on a cell that detects activity of other cells. Synapses
//! refer to their presynaptic cell by address, never by reference, so segments neither own nor
//! keep alive the cells they listen to.
//!
//! Segment updates are the deferred half of temporal learning: the activation and prediction
//! phases only record *which* synapses were active and which cells could be grown onto, and the
//! learning phase later decides whether that record is applied as reinforcement, as punishment,
//! or not at all.

use super::{cell::CellAddress, synapses::clamp_permanence};
use fxhash::FxHashSet;
use rand::{seq::IteratorRandom, Rng};

/// A synapse from a presynaptic cell onto a segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LateralSynapse {
    pub source: CellAddress,
    pub permanence: f32,
}

/// Ordering key used to choose between segments. Sequence segments beat non-sequence ones,
/// then more active synapses beat fewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentRank {
    pub is_sequence: bool,
    pub active_count: usize,
}

/// Picks the highest ranked `(segment index, rank)` pair. Ties keep the earliest candidate.
pub fn best_ranked<I>(candidates: I) -> Option<(usize, SegmentRank)>
where
    I: IntoIterator<Item = (usize, SegmentRank)>,
{
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some((_, rank)) if rank >= candidate.1 => best,
        _ => Some(candidate),
    })
}

/// A dendritic segment on a cell.
#[derive(Clone, Debug, Default)]
pub struct Segment {
    /// Set once the segment has correctly predicted a feed-forward activation.
    pub is_sequence: bool,

    pub synapses: Vec<LateralSynapse>,

    /// Connected synapses that saw an active source during the last prediction phase.
    active_synapse_count: usize,
}

impl Segment {
    pub fn new(is_sequence: bool) -> Self {
        Self {
            is_sequence,
            ..Self::default()
        }
    }

    /// Number of connected synapses whose source satisfies `is_on`.
    pub fn connected_active_count<F>(&self, connected: f32, is_on: F) -> usize
    where
        F: Fn(CellAddress) -> bool,
    {
        self.synapses
            .iter()
            .filter(|syn| syn.permanence > connected && is_on(syn.source))
            .count()
    }

    /// Number of synapses, connected or not, whose source satisfies `is_on`.
    pub fn potential_active_count<F>(&self, is_on: F) -> usize
    where
        F: Fn(CellAddress) -> bool,
    {
        self.synapses.iter().filter(|syn| is_on(syn.source)).count()
    }

    /// Sources of all synapses, connected or not, that satisfy `is_on`.
    pub fn active_sources<F>(&self, is_on: F) -> Vec<CellAddress>
    where
        F: Fn(CellAddress) -> bool,
    {
        self.synapses
            .iter()
            .filter(|syn| is_on(syn.source))
            .map(|syn| syn.source)
            .collect()
    }

    #[inline]
    pub fn rank(&self, active_count: usize) -> SegmentRank {
        SegmentRank {
            is_sequence: self.is_sequence,
            active_count,
        }
    }

    /// The cached connected-active count from the last prediction phase.
    #[inline]
    pub fn active_synapse_count(&self) -> usize {
        self.active_synapse_count
    }

    #[inline]
    pub(crate) fn set_active_synapse_count(&mut self, count: usize) {
        self.active_synapse_count = count;
    }

    /// Positive reinforcement: synapses from `active` sources gain `increment`,
    /// every other synapse loses `decrement`.
    pub fn reinforce(&mut self, active: &FxHashSet<CellAddress>, increment: f32, decrement: f32) {
        for syn in &mut self.synapses {
            syn.permanence = if active.contains(&syn.source) {
                clamp_permanence(syn.permanence + increment)
            } else {
                clamp_permanence(syn.permanence - decrement)
            };
        }
    }

    /// Negative reinforcement: only synapses from `active` sources lose `decrement`.
    pub fn punish(&mut self, active: &FxHashSet<CellAddress>, decrement: f32) {
        for syn in self
            .synapses
            .iter_mut()
            .filter(|syn| active.contains(&syn.source))
        {
            syn.permanence = clamp_permanence(syn.permanence - decrement);
        }
    }

    /// Grows up to `count` synapses onto cells sampled without replacement from `pool`.
    /// The owning cell and cells already on the segment are never chosen.
    /// Returns the number of synapses added.
    pub fn grow<R: Rng>(
        &mut self,
        owner: CellAddress,
        pool: &[CellAddress],
        count: usize,
        initial_permanence: f32,
        rng: &mut R,
    ) -> usize {
        if count == 0 || pool.is_empty() {
            return 0;
        }

        let existing: FxHashSet<CellAddress> = self.synapses.iter().map(|syn| syn.source).collect();
        let chosen = pool
            .iter()
            .copied()
            .filter(|source| *source != owner && !existing.contains(source))
            .choose_multiple(rng, count);

        self.synapses
            .extend(chosen.iter().map(|&source| LateralSynapse {
                source,
                permanence: clamp_permanence(initial_permanence),
            }));

        chosen.len()
    }
}

/// A pending set of permanence changes for one segment of one cell.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentUpdate {
    /// The cell owning the target segment.
    pub cell: CellAddress,

    /// Index of an existing segment, or `None` to create a new one on application.
    pub segment: Option<usize>,

    /// Sources of the segment's synapses that were active at the referenced time step.
    pub active_sources: Vec<CellAddress>,

    /// Cells that were learning at the referenced time step. Empty when no growth is requested.
    pub learning_pool: Vec<CellAddress>,

    /// Marks the target segment as a sequence segment once applied.
    pub sequence: bool,

    /// The tick the update was queued in.
    pub generation: u64,
}

impl SegmentUpdate {
    /// Whether the update still refers to the previous or the current tick of `generation`.
    #[inline]
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation + 1 >= generation
    }

    /// How many synapses growth should add on top of the active ones.
    #[inline]
    pub fn growth_target(&self, new_synapse_count: usize) -> usize {
        if self.learning_pool.is_empty() {
            0
        } else {
            new_synapse_count.saturating_sub(self.active_sources.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn addr(col: usize, cell: usize) -> CellAddress {
        CellAddress::new(col, cell)
    }

    fn segment_with(is_sequence: bool, perms: &[(CellAddress, f32)]) -> Segment {
        let mut segment = Segment::new(is_sequence);
        segment.synapses = perms
            .iter()
            .map(|&(source, permanence)| LateralSynapse { source, permanence })
            .collect();
        segment
    }

    #[test]
    fn test_rank_prefers_sequence_over_activity() {
        let sequence = SegmentRank {
            is_sequence: true,
            active_count: 2,
        };
        let busy = SegmentRank {
            is_sequence: false,
            active_count: 3,
        };
        assert!(sequence > busy);
        assert!(
            busy < SegmentRank {
                is_sequence: false,
                active_count: 4
            }
        );
    }

    #[test]
    fn test_best_ranked_keeps_first_on_tie() {
        let rank = |is_sequence, active_count| SegmentRank {
            is_sequence,
            active_count,
        };
        let best = best_ranked(vec![
            (0, rank(false, 5)),
            (1, rank(true, 1)),
            (2, rank(true, 3)),
            (3, rank(true, 3)),
        ]);
        assert_eq!(best.map(|(i, _)| i), Some(2));
        assert_eq!(best_ranked(Vec::new()), None);
    }

    #[test]
    fn test_counts_respect_connection() {
        let segment = segment_with(false, &[(addr(0, 0), 0.5), (addr(0, 1), 0.1), (addr(1, 0), 0.9)]);
        let on = |a: CellAddress| a.col == 0;
        assert_eq!(segment.connected_active_count(0.2, on), 1);
        assert_eq!(segment.potential_active_count(on), 2);
        assert_eq!(segment.active_sources(on), vec![addr(0, 0), addr(0, 1)]);
    }

    #[test]
    fn test_reinforce_and_punish_clamp() {
        let mut segment = segment_with(true, &[(addr(0, 0), 0.98), (addr(1, 0), 0.01)]);
        let active: FxHashSet<CellAddress> = [addr(0, 0)].into_iter().collect();

        segment.reinforce(&active, 0.05, 0.05);
        assert_relative_eq!(segment.synapses[0].permanence, 1.0);
        assert_relative_eq!(segment.synapses[1].permanence, 0.0);

        let mut segment = segment_with(true, &[(addr(0, 0), 0.5), (addr(1, 0), 0.5)]);
        segment.punish(&active, 0.1);
        assert_relative_eq!(segment.synapses[0].permanence, 0.4);
        assert_relative_eq!(segment.synapses[1].permanence, 0.5);
    }

    #[test]
    fn test_grow_skips_owner_and_existing() {
        let mut rng = StdRng::seed_from_u64(7);
        let owner = addr(2, 0);
        let mut segment = segment_with(false, &[(addr(0, 0), 0.3)]);
        let pool = vec![addr(0, 0), owner, addr(1, 1), addr(3, 0)];

        let grown = segment.grow(owner, &pool, 5, 0.3, &mut rng);
        assert_eq!(grown, 2);

        let mut sources: Vec<_> = segment.synapses.iter().map(|s| s.source).collect();
        sources.sort();
        assert_eq!(sources, vec![addr(0, 0), addr(1, 1), addr(3, 0)]);
        assert_eq!(segment.grow(owner, &pool, 5, 0.3, &mut rng), 0);
    }

    #[test]
    fn test_grow_samples_without_replacement() {
        let mut rng = StdRng::seed_from_u64(1);
        let pool: Vec<_> = (0..10).map(|c| addr(c, 0)).collect();
        let mut segment = Segment::new(false);

        assert_eq!(segment.grow(addr(20, 0), &pool, 4, 0.3, &mut rng), 4);
        let unique: FxHashSet<_> = segment.synapses.iter().map(|s| s.source).collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_growth_target() {
        let mut update = SegmentUpdate {
            cell: addr(0, 0),
            segment: None,
            active_sources: vec![addr(1, 0)],
            learning_pool: vec![],
            sequence: false,
            generation: 0,
        };
        assert_eq!(update.growth_target(3), 0);

        update.learning_pool = vec![addr(2, 0)];
        assert_eq!(update.growth_target(3), 2);
        assert_eq!(update.growth_target(1), 0);
    }

    #[test]
    fn test_update_expires_after_one_tick() {
        let update = SegmentUpdate {
            cell: addr(0, 0),
            segment: Some(0),
            active_sources: vec![],
            learning_pool: vec![],
            sequence: false,
            generation: 5,
        };
        assert!(update.is_current(5));
        assert!(update.is_current(6));
        assert!(!update.is_current(7));
    }
}
