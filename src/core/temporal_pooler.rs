//! The `TemporalPooler` learns sequences of spatial pooler outputs and predicts which columns
//! will become active next.
//!
//! Every column holds a fixed stack of cells. A cell that is active in a column tells *which
//! context* the column's input appeared in, and lateral segments on the cells learn to recognize
//! the cells that were active one step earlier.
//!
//! How It Works:
//! - Phase 1 (activation): in every active column, cells that were predicted by a sequence segment
//!   become active. Without such a prediction the column bursts and all of its cells become
//!   active. Each active column elects exactly one learning cell.
//! - Phase 2 (prediction): every cell with a segment driven by the now active cells becomes
//!   predictive. The synapses responsible are queued as segment updates.
//! - Phase 3 (learning): queued updates of learning cells are applied positively; updates of cells
//!   that predicted but did not fire are applied negatively.
//!
//! Flags for the current and the previous tick are kept in two slots per cell, selected by a
//! generation counter that is advanced once per tick.

use super::{
    cell::{Cell, CellAddress, CellFlags, CellState, TimeStep},
    segment::{best_ranked, Segment, SegmentUpdate},
};
use crate::{
    config::HtmConfig,
    error::{HtmError, Result},
};
use fxhash::FxHashSet;
use rand::prelude::*;
use std::mem;

/// Holds the parameters required for sequence learning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemporalPoolerParams {
    /// A segment is active when strictly more connected synapses than this see active cells.
    pub activation_threshold: usize,
    /// A segment matches when strictly more synapses than this see active cells.
    pub min_threshold: usize,
    pub connected_permanence: f32,
    pub initial_permanence: f32,
    pub permanence_increment: f32,
    pub permanence_decrement: f32,
    /// Upper bound of active plus newly grown synapses per applied update.
    pub new_synapse_count: usize,
    pub seed: u64,
}

impl From<&HtmConfig> for TemporalPoolerParams {
    fn from(config: &HtmConfig) -> Self {
        Self {
            activation_threshold: config.activation_threshold,
            min_threshold: config.min_threshold,
            connected_permanence: config.connected_permanence,
            initial_permanence: config.initial_permanence,
            permanence_increment: config.permanence_inc,
            permanence_decrement: config.permanence_dec,
            new_synapse_count: config.new_synapse_count,
            seed: config.seed,
        }
    }
}

/// Sequence memory over the columns of a spatial pooler.
#[derive(Debug, Clone)]
pub struct TemporalPooler {
    /// All cells, column-major: cell `i` of column `c` lives at `c * cells_per_column + i`.
    cells: Vec<Cell>,
    num_columns: usize,
    cells_per_column: usize,
    params: TemporalPoolerParams,

    /// Number of completed ticks.
    generation: u64,

    rand: StdRng,
}

impl TemporalPooler {
    /// Constructs a temporal pooler with `cells_per_column` empty cells in each of `num_columns`.
    pub fn new(num_columns: usize, cells_per_column: usize, params: TemporalPoolerParams) -> Result<Self> {
        if cells_per_column == 0 {
            return Err(HtmError::InvalidParameter(
                "a column needs at least one cell".to_string(),
            ));
        }
        if params.min_threshold > params.activation_threshold {
            return Err(HtmError::InvalidParameter(format!(
                "min_threshold {} exceeds activation_threshold {}",
                params.min_threshold, params.activation_threshold
            )));
        }

        Ok(Self {
            cells: vec![Cell::new(); num_columns * cells_per_column],
            num_columns,
            cells_per_column,
            params,
            generation: 0,
            rand: StdRng::seed_from_u64(params.seed),
        })
    }

    /// Builds a temporal pooler sized and parameterized by `config`.
    pub fn from_config(config: &HtmConfig) -> Result<Self> {
        Self::new(
            config.columns_count,
            config.cells_per_column,
            TemporalPoolerParams::from(config),
        )
    }

    /// Executes one tick of the temporal pooler for the given winner columns.
    ///
    /// Column indices outside the pooler are ignored. Duplicates count once.
    /// With `learn` disabled, cell states are computed but no segment is queued or changed.
    pub fn compute(&mut self, active_columns: &[usize], learn: bool) {
        self.advance_generation();

        let mut columns: Vec<usize> = active_columns
            .iter()
            .copied()
            .filter(|&col| {
                let valid = col < self.num_columns;
                if !valid {
                    log::warn!("[TP] Ignoring active column {} of {}", col, self.num_columns);
                }
                valid
            })
            .collect::<FxHashSet<_>>()
            .into_iter()
            .collect();
        columns.sort_unstable();

        // Cells that were learning on the previous tick; the candidates for synapse growth.
        let learning_pool = self.cells_with(TimeStep::Before, CellState::Learn);

        let bursting = self.compute_active_state(&columns, &learning_pool, learn);
        let predictive = self.compute_predictive_state(&learning_pool, learn);
        let (applied, grown) = if learn {
            self.apply_segment_updates()
        } else {
            (0, 0)
        };

        log::debug!(
            "[TP] Generation {}: {} active columns, {} bursting, {} predictive cells, {} updates applied, {} segments grown",
            self.generation,
            columns.len(),
            bursting,
            predictive,
            applied,
            grown
        );
    }

    /// Starts a new tick: the previous `Now` becomes `Before` and the new `Now` is cleared.
    fn advance_generation(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        for cell in &mut self.cells {
            *cell.state_mut(generation, TimeStep::Now) = CellFlags::default();
        }
    }

    /// Phase 1. Returns the number of bursting columns.
    fn compute_active_state(
        &mut self,
        columns: &[usize],
        learning_pool: &[CellAddress],
        learn: bool,
    ) -> usize {
        let generation = self.generation;
        let mut bursting = 0;

        for &col in columns {
            let mut bottom_up_predicted = false;
            let mut learning_cell_chosen = false;

            for i in 0..self.cells_per_column {
                let idx = self.index(CellAddress::new(col, i));
                if !self.cells[idx].state(generation, TimeStep::Before).predictive {
                    continue;
                }

                let Some(seg) = self.active_segment(idx, TimeStep::Before, CellState::Active) else {
                    continue;
                };
                if !self.cells[idx].segments[seg].is_sequence {
                    continue;
                }

                bottom_up_predicted = true;
                let learned = self.segment_active(idx, seg, TimeStep::Before, CellState::Learn);
                let now = self.cells[idx].state_mut(generation, TimeStep::Now);
                now.active = true;
                if learned {
                    learning_cell_chosen = true;
                    now.learn = true;
                }
            }

            if !bottom_up_predicted {
                bursting += 1;
                log::trace!("[TP] Column {} bursts", col);
                for i in 0..self.cells_per_column {
                    let idx = self.index(CellAddress::new(col, i));
                    self.cells[idx].state_mut(generation, TimeStep::Now).active = true;
                }
            }

            if !learning_cell_chosen {
                let (addr, seg) = self.best_matching_cell(col, TimeStep::Before);
                let idx = self.index(addr);
                self.cells[idx].state_mut(generation, TimeStep::Now).learn = true;

                if learn {
                    let mut update = self.segment_update(addr, seg, TimeStep::Before, Some(learning_pool));
                    update.sequence = true;
                    self.cells[idx].queue.push(update);
                }
            }
        }

        bursting
    }

    /// Phase 2. Returns the number of predictive cells.
    fn compute_predictive_state(&mut self, learning_pool: &[CellAddress], learn: bool) -> usize {
        let generation = self.generation;
        let mut predictive = 0;

        for idx in 0..self.cells.len() {
            let addr = self.address(idx);
            let counts: Vec<usize> = (0..self.cells[idx].segments.len())
                .map(|seg| self.connected_count(idx, seg, TimeStep::Now, CellState::Active))
                .collect();

            let mut updates = Vec::new();
            let mut is_predictive = false;
            for (seg, &count) in counts.iter().enumerate() {
                if count <= self.params.activation_threshold {
                    continue;
                }
                is_predictive = true;

                if learn {
                    updates.push(self.segment_update(addr, Some(seg), TimeStep::Now, None));
                    if let Some(earlier) = self.best_matching_segment(idx, TimeStep::Before) {
                        updates.push(self.segment_update(
                            addr,
                            Some(earlier),
                            TimeStep::Before,
                            Some(learning_pool),
                        ));
                    }
                }
            }

            let cell = &mut self.cells[idx];
            for (segment, count) in cell.segments.iter_mut().zip(counts) {
                segment.set_active_synapse_count(count);
            }
            if is_predictive {
                predictive += 1;
                cell.state_mut(generation, TimeStep::Now).predictive = true;
            }
            cell.queue.extend(updates);
        }

        predictive
    }

    /// Phase 3. Returns the number of applied updates and of newly created segments.
    ///
    /// Only updates queued on this or the previous tick survive; older ones are discarded
    /// whether or not they were applied.
    fn apply_segment_updates(&mut self) -> (usize, usize) {
        let generation = self.generation;
        let mut applied = 0;
        let mut grown = 0;

        for idx in 0..self.cells.len() {
            self.cells[idx].queue.retain(|update| update.is_current(generation));

            let now = self.cells[idx].state(generation, TimeStep::Now);
            let before = self.cells[idx].state(generation, TimeStep::Before);

            let positive = if now.learn {
                true
            } else if before.predictive && !now.predictive {
                false
            } else {
                continue;
            };

            let updates = mem::take(&mut self.cells[idx].queue);
            applied += updates.len();
            grown += self.adapt_segments(idx, updates, positive);
        }

        (applied, grown)
    }

    /// Applies `updates` to the segments of cell `idx`. Returns the number of new segments.
    fn adapt_segments(&mut self, idx: usize, updates: Vec<SegmentUpdate>, positive: bool) -> usize {
        let owner = self.address(idx);
        let params = self.params;
        let Self { cells, rand, .. } = self;
        let cell = &mut cells[idx];
        let mut created = 0;

        for update in updates {
            let active: FxHashSet<CellAddress> = update.active_sources.iter().copied().collect();
            let growth = update.growth_target(params.new_synapse_count);

            match (update.segment, positive) {
                (Some(seg), true) => {
                    let segment = &mut cell.segments[seg];
                    segment.reinforce(&active, params.permanence_increment, params.permanence_decrement);
                    if update.sequence {
                        segment.is_sequence = true;
                    }
                    segment.grow(owner, &update.learning_pool, growth, params.initial_permanence, rand);
                }
                (Some(seg), false) => {
                    cell.segments[seg].punish(&active, params.permanence_decrement);
                }
                (None, true) => {
                    let mut segment = Segment::new(update.sequence);
                    if segment.grow(owner, &update.learning_pool, growth, params.initial_permanence, rand) > 0 {
                        log::trace!(
                            "[TP] Cell {:?} grows segment {} with {} synapses",
                            owner,
                            cell.segments.len(),
                            segment.synapses.len()
                        );
                        cell.segments.push(segment);
                        created += 1;
                    }
                }
                (None, false) => {}
            }
        }

        created
    }

    /// Builds an update for `segment` of `addr` against the cells active at `t`.
    /// Growth is requested by passing the learning cells of that tick as `learning_pool`.
    fn segment_update(
        &self,
        addr: CellAddress,
        segment: Option<usize>,
        t: TimeStep,
        learning_pool: Option<&[CellAddress]>,
    ) -> SegmentUpdate {
        let idx = self.index(addr);
        let active_sources = segment
            .map(|seg| {
                self.cells[idx].segments[seg].active_sources(|src| self.flag(src, t, CellState::Active))
            })
            .unwrap_or_default();

        SegmentUpdate {
            cell: addr,
            segment,
            active_sources,
            learning_pool: learning_pool.map(<[CellAddress]>::to_vec).unwrap_or_default(),
            sequence: false,
            generation: self.generation,
        }
    }

    /// Connected synapses of segment `seg` whose source has `state` at `t`.
    fn connected_count(&self, idx: usize, seg: usize, t: TimeStep, state: CellState) -> usize {
        self.cells[idx].segments[seg]
            .connected_active_count(self.params.connected_permanence, |src| self.flag(src, t, state))
    }

    fn segment_active(&self, idx: usize, seg: usize, t: TimeStep, state: CellState) -> bool {
        self.connected_count(idx, seg, t, state) > self.params.activation_threshold
    }

    /// The active segment of cell `idx` at `t`, preferring sequence segments, then activity.
    fn active_segment(&self, idx: usize, t: TimeStep, state: CellState) -> Option<usize> {
        let cell = &self.cells[idx];
        best_ranked(cell.segments.iter().enumerate().filter_map(|(seg, segment)| {
            let count = self.connected_count(idx, seg, t, state);
            (count > self.params.activation_threshold).then(|| (seg, segment.rank(count)))
        }))
        .map(|(seg, _)| seg)
    }

    /// The segment of cell `idx` with the most synapses (of any permanence) onto cells active at `t`.
    fn best_matching_segment(&self, idx: usize, t: TimeStep) -> Option<usize> {
        self.matching_segment(idx, t).map(|(seg, _)| seg)
    }

    fn matching_segment(&self, idx: usize, t: TimeStep) -> Option<(usize, usize)> {
        let cell = &self.cells[idx];
        best_ranked(cell.segments.iter().enumerate().filter_map(|(seg, segment)| {
            let count = segment.potential_active_count(|src| self.flag(src, t, CellState::Active));
            (count > self.params.min_threshold).then(|| (seg, segment.rank(count)))
        }))
        .map(|(seg, rank)| (seg, rank.active_count))
    }

    /// The cell of `col` holding the best matching segment at `t`, together with that segment.
    /// Without any match, the least used cell is returned without a segment.
    fn best_matching_cell(&mut self, col: usize, t: TimeStep) -> (CellAddress, Option<usize>) {
        let mut best: Option<(usize, usize, usize)> = None;
        for i in 0..self.cells_per_column {
            let idx = self.index(CellAddress::new(col, i));
            if let Some((seg, count)) = self.matching_segment(idx, t) {
                if best.map_or(true, |(_, _, top)| count > top) {
                    best = Some((i, seg, count));
                }
            }
        }

        match best {
            Some((cell, seg, _)) => (CellAddress::new(col, cell), Some(seg)),
            None => (self.least_used_cell(col), None),
        }
    }

    /// Identifies the cell with the fewest segments within a column.
    /// If multiple cells share the minimum, one is chosen at random.
    fn least_used_cell(&mut self, col: usize) -> CellAddress {
        let mut min_segments = usize::MAX;
        let mut min_cells = Vec::new();

        for i in 0..self.cells_per_column {
            let seg_count = self.cells[self.index(CellAddress::new(col, i))].segments.len();
            if seg_count < min_segments {
                min_segments = seg_count;
                min_cells.clear();
                min_cells.push(i);
            } else if seg_count == min_segments {
                min_cells.push(i);
            }
        }

        let cell = if min_cells.len() > 1 {
            min_cells[self.rand.random_range(0..min_cells.len())]
        } else {
            min_cells[0]
        };

        CellAddress::new(col, cell)
    }

    #[inline]
    fn index(&self, addr: CellAddress) -> usize {
        addr.col * self.cells_per_column + addr.cell
    }

    #[inline]
    fn address(&self, idx: usize) -> CellAddress {
        CellAddress::new(idx / self.cells_per_column, idx % self.cells_per_column)
    }

    #[inline]
    fn flag(&self, addr: CellAddress, t: TimeStep, state: CellState) -> bool {
        self.cells[self.index(addr)].state(self.generation, t).get(state)
    }

    fn cells_with(&self, t: TimeStep, state: CellState) -> Vec<CellAddress> {
        (0..self.cells.len())
            .filter(|&idx| self.cells[idx].state(self.generation, t).get(state))
            .map(|idx| self.address(idx))
            .collect()
    }

    /// Number of completed ticks.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    #[inline]
    pub fn cells_per_column(&self) -> usize {
        self.cells_per_column
    }

    #[inline]
    pub fn params(&self) -> &TemporalPoolerParams {
        &self.params
    }

    /// The cell at `addr`, if it exists.
    pub fn cell(&self, addr: CellAddress) -> Option<&Cell> {
        (addr.col < self.num_columns && addr.cell < self.cells_per_column)
            .then(|| &self.cells[self.index(addr)])
    }

    /// The flags of `addr` at time step `t` relative to the last completed tick.
    pub fn cell_state(&self, addr: CellAddress, t: TimeStep) -> Option<CellFlags> {
        self.cell(addr).map(|cell| cell.state(self.generation, t))
    }

    /// Cells active on the last tick, ordered by address.
    pub fn active_cells(&self) -> Vec<CellAddress> {
        self.cells_with(TimeStep::Now, CellState::Active)
    }

    /// Cells predicted to fire on the next tick, ordered by address.
    pub fn predictive_cells(&self) -> Vec<CellAddress> {
        self.cells_with(TimeStep::Now, CellState::Predictive)
    }

    /// Cells selected for learning on the last tick, ordered by address.
    pub fn learning_cells(&self) -> Vec<CellAddress> {
        self.cells_with(TimeStep::Now, CellState::Learn)
    }

    /// Columns containing at least one predictive cell, in ascending order.
    pub fn predictive_columns(&self) -> Vec<usize> {
        let mut columns: Vec<usize> = self.predictive_cells().iter().map(|addr| addr.col).collect();
        columns.dedup();
        columns
    }

    /// Total number of segments over all cells.
    pub fn num_segments(&self) -> usize {
        self.cells.iter().map(|cell| cell.segments.len()).sum()
    }

    /// Total number of lateral synapses over all segments.
    pub fn num_synapses(&self) -> usize {
        self.cells
            .iter()
            .flat_map(|cell| &cell.segments)
            .map(|segment| segment.synapses.len())
            .sum()
    }

    /// Iterates over every lateral synapse permanence.
    pub fn permanences(&self) -> impl Iterator<Item = f32> + '_ {
        self.cells
            .iter()
            .flat_map(|cell| &cell.segments)
            .flat_map(|segment| segment.synapses.iter().map(|syn| syn.permanence))
    }
}
