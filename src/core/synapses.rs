//! A proximal `Synapse` models a single connection between a spatial column and one input bit.
//! Each synapse links exactly one input coordinate to one column.
//!
//! If the permanence is strictly above the connected threshold, the synapse is considered "connected".
//! During learning, permanence is increased or decreased depending on whether the corresponding
//! input bit was active. A connected synapse whose input bit is on counts toward the column's overlap.
//!
//! The centralized `Synapses` struct is a pool that stores the potential synapses of all columns
//! in a single contiguous vec. Each column owns a fixed-size subrange of it, since the potential
//! set of a column never changes after construction. Within its subrange a column keeps its
//! connected synapses at the front, so overlap computation only walks the connected prefix.

use super::topology::Coordinate;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Lower bound of every permanence value.
pub const MIN_PERMANENCE: f32 = 0.0;

/// Upper bound of every permanence value.
pub const MAX_PERMANENCE: f32 = 1.0;

/// Clamps a permanence into `[MIN_PERMANENCE, MAX_PERMANENCE]`.
#[inline]
pub fn clamp_permanence(permanence: f32) -> f32 {
    permanence.clamp(MIN_PERMANENCE, MAX_PERMANENCE)
}

/// A synapse connecting an input coordinate with an associated permanence value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Synapse {
    /// The input bit this synapse reads.
    pub source: Coordinate,

    /// Represents the strength of the connection between the synapse and the input bit.
    pub permanence: f32,
}

impl Synapse {
    #[inline]
    pub fn new(source: Coordinate, permanence: f32) -> Self {
        Self { source, permanence }
    }

    #[inline]
    pub fn is_connected(&self, connected_threshold: f32) -> bool {
        self.permanence > connected_threshold
    }
}

/// Options governing how proximal permanence is adjusted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynapsePermanenceOptions {
    /// Added to synapses of a winning column whose input bit was on.
    pub active_increment: f32,
    /// Removed from synapses of a winning column whose input bit was off.
    pub inactive_decrement: f32,
    /// Threshold a permanence must exceed for the synapse to be connected.
    pub connected: f32,
    /// Added to all synapses of a column whose overlap duty cycle is starving.
    pub below_duty_increment: f32,
}

/// A flat pool of potential synapses for all columns.
/// Each column is allotted a contiguous region of `synapses_per_column` entries.
#[derive(Debug, Clone)]
pub struct Synapses {
    /// All potential synapses for each column.
    synapses: Vec<Synapse>,

    /// The number of connected synapses for each column after pivot sorting.
    connected_synapse_count_per_column: Vec<usize>,

    /// The fixed number of synapses every column owns.
    synapses_per_column: usize,
}

impl Synapses {
    /// Creates a new synapse pool for `num_columns` columns with `synapses_per_column` synapses each.
    pub fn new(num_columns: usize, synapses_per_column: usize) -> Self {
        Self {
            synapses: vec![Synapse::default(); num_columns * synapses_per_column],
            connected_synapse_count_per_column: vec![0; num_columns],
            synapses_per_column,
        }
    }

    /// Installs the potential synapses of a column. Permanences are clamped into range and the
    /// column is re-sorted so its connected synapses come first.
    ///
    /// Callers check the length up front; `potential` must hold exactly `synapses_per_column`
    /// entries.
    pub fn init_column(&mut self, column: usize, potential: &[Synapse], connected_threshold: f32) {
        debug_assert_eq!(
            potential.len(),
            self.synapses_per_column,
            "column {} must own exactly {} potential synapses",
            column,
            self.synapses_per_column
        );
        let range = self.col_range(column);
        self.synapses[range.clone()].copy_from_slice(potential);
        for syn in &mut self.synapses[range] {
            syn.permanence = clamp_permanence(syn.permanence);
        }
        self.sort_column(column, connected_threshold);
    }

    /// Reorders the synapses in a column so that those with permanence > `connected_threshold` come first.
    pub fn sort_column(&mut self, column: usize, connected_threshold: f32) {
        let range = self.col_range(column);
        let slice = &mut self.synapses[range];

        let mut pivot = 0;

        for i in 0..slice.len() {
            if slice[i].is_connected(connected_threshold) {
                slice.swap(i, pivot);
                pivot += 1;
            }
        }

        self.connected_synapse_count_per_column[column] = pivot;
    }

    /// Clamps every permanence of the column into range, then re-sorts it so that connected
    /// synapses come first. Must follow every batch of permanence mutations.
    pub fn update_column_permanences(&mut self, column: usize, connected_threshold: f32) {
        for syn in self.column_mut(column) {
            syn.permanence = clamp_permanence(syn.permanence);
        }

        self.sort_column(column, connected_threshold);
    }

    /// Returns the index range corresponding to the synapses stored for the given column.
    fn col_range(&self, column: usize) -> Range<usize> {
        let start = column * self.synapses_per_column;
        start..start + self.synapses_per_column
    }

    /// Returns an immutable slice for all synapses in the given column.
    pub fn column(&self, column: usize) -> &[Synapse] {
        &self.synapses[self.col_range(column)]
    }

    /// Returns a mutable slice for all synapses in the given column.
    pub fn column_mut(&mut self, column: usize) -> &mut [Synapse] {
        let r = self.col_range(column);
        &mut self.synapses[r]
    }

    /// Returns an immutable slice for the connected synapses in the given column.
    pub fn column_connected(&self, column: usize) -> &[Synapse] {
        let start = column * self.synapses_per_column;
        &self.synapses[start..start + self.connected_synapse_count_per_column[column]]
    }
}
