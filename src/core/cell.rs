//! Cells are the temporal units stacked inside every column.
//!
//! A cell carries three flags (active, predictive, learn) for two adjacent time steps. Instead of a
//! global toggle, the time step is resolved against an explicit generation counter: the slot
//! written during generation `g` is `g % 2`, and the slot of the previous tick is the other one.
//! Advancing the generation therefore swaps the Before/Now roles without copying anything.

use super::segment::{Segment, SegmentUpdate};

/// Uniquely identifies a cell by its column and its position within the column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub col: usize,
    pub cell: usize,
}

impl CellAddress {
    #[inline]
    pub fn new(col: usize, cell: usize) -> Self {
        Self { col, cell }
    }
}

/// Which of the two tracked time steps a read or write refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeStep {
    /// The tick currently being computed (or the last completed one, between ticks).
    Now,
    /// The tick before `Now`.
    Before,
}

impl TimeStep {
    /// Storage slot of this time step during `generation`.
    #[inline]
    pub fn slot(self, generation: u64) -> usize {
        let now = (generation % 2) as usize;
        match self {
            TimeStep::Now => now,
            TimeStep::Before => 1 - now,
        }
    }
}

/// Selects one of the per-cell flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    Active,
    Predictive,
    Learn,
}

/// The flags of one cell at one time step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellFlags {
    pub active: bool,
    pub predictive: bool,
    pub learn: bool,
}

impl CellFlags {
    #[inline]
    pub fn get(self, state: CellState) -> bool {
        match state {
            CellState::Active => self.active,
            CellState::Predictive => self.predictive,
            CellState::Learn => self.learn,
        }
    }
}

/// A cell owns its distal segments and the segment updates queued for it.
#[derive(Clone, Debug, Default)]
pub struct Cell {
    /// Segments only ever grow; indices stay valid for the lifetime of the cell.
    pub segments: Vec<Segment>,

    /// Pending permanence changes, consumed in the learning phase.
    pub queue: Vec<SegmentUpdate>,

    states: [CellFlags; 2],
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    /// The flags at time step `t` during `generation`.
    #[inline]
    pub fn state(&self, generation: u64, t: TimeStep) -> CellFlags {
        self.states[t.slot(generation)]
    }

    /// Mutable access to the flags at time step `t` during `generation`.
    #[inline]
    pub fn state_mut(&mut self, generation: u64, t: TimeStep) -> &mut CellFlags {
        &mut self.states[t.slot(generation)]
    }
}
