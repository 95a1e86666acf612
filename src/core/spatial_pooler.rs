//! The `SpatialPooler` is a core component of HTM that:
//! - Maintains a fixed set of columns, each anchored on the input grid with its own potential synapses.
//! - Computes an "overlap" score for each column based on how many connected synapses see an active input bit.
//! - Enforces sparse activity via local inhibition: a column only wins if its overlap ranks among the
//!   `desired_local_activity` best of the columns anchored around it.
//! - Learns to increase/decrease synapse permanence (strength) values if the connected input bit was active/inactive.
//!
//! Each column selectively "tunes" its connections to represent frequently encountered input patterns, leading to SDRs.
//!
//! One tick runs three phases in order: Overlap, Inhibition and Learn.
//!
//! What are duty cycles?
//! - They are rolling metrics that measure how often each column is meeting certain criteria over time.
//! - The SP tracks: overlap duty cycles (ODC) and active duty cycles (ADC).
//! - ODC tracks how frequently a column's overlap survives the `min_overlap` cut.
//! - ADC tracks how frequently a column is chosen as a winner after inhibition.
//! - A column whose ADC drops under a fraction of its neighborhood's best ADC gets its boost raised.
//! - A column whose ODC drops under the same level gets all its permanences bumped.
//!
//! The inhibition radius adapts too: after learning it becomes the average distance between the
//! columns and their connected synapses, so neighborhoods track the size of the receptive fields.

use super::{
    column::{Column, ColumnLayout},
    input::InputGrid,
    synapses::{Synapse, SynapsePermanenceOptions, Synapses},
    topology::{average_receptive_field, neighbors_within, Coordinate, InhibitionRadius, Topology},
};
use crate::{
    config::HtmConfig,
    error::{HtmError, Result},
};

/// The SpatialPooler manages a set of columns that compete to represent the input space.
/// It computes overlaps, applies local inhibition, boosts weak columns, and adapts synapses during learning.
/// Synapse management is performed via the embedded `Synapses` pool.
#[derive(Debug, Clone)]
pub struct SpatialPooler {
    /// The total number of compute iterations performed so far (whether learning or not).
    pub iteration_num: u32,

    /// The number of compute iterations performed so far with learning enabled.
    pub iteration_learn_num: u32,

    /// The minimum raw overlap a column must have to be considered for winning.
    pub min_overlap: f32,

    /// How many columns may win within one inhibition neighborhood.
    pub desired_local_activity: usize,

    /// Fraction of the neighborhood's peak active duty cycle below which a column is starving.
    pub boost_step: f32,

    /// Settings for how synapse permanence is incremented/decremented and the connected threshold.
    pub synapse_permanence_options: SynapsePermanenceOptions,

    /// The shape of the input space.
    pub input_topology: Topology,

    /// All columns, in index order.
    pub columns: Vec<Column>,

    /// A pool managing all proximal synapse data, one fixed-size block per column.
    pub synapses: Synapses,

    /// The adaptive half-width of the inhibition neighborhood.
    pub inhibition_radius: InhibitionRadius,

    /// The indices of columns that won the inhibition process this iteration (i.e., the active columns).
    pub winner_columns: Vec<usize>,

    /// Column anchors in index order, used for neighbor searches.
    column_coordinates: Vec<Coordinate>,
}

impl SpatialPooler {
    /// Creates a new `SpatialPooler` from a finished column layout.
    ///
    /// Fails fast when the layout does not match the configuration: wrong column count,
    /// wrong number of potential synapses, or coordinates off the input grid.
    pub fn new(config: &HtmConfig, layout: Vec<ColumnLayout>) -> Result<Self> {
        config.validate()?;

        if layout.len() != config.columns_count {
            return Err(HtmError::ColumnCountMismatch {
                expected: config.columns_count,
                actual: layout.len(),
            });
        }

        let input_topology = Topology::new(config.input_width, config.input_height);
        let out_of_bounds = |c: Coordinate| HtmError::CoordinateOutOfBounds {
            x: c.x,
            y: c.y,
            width: config.input_width,
            height: config.input_height,
        };

        for (index, column) in layout.iter().enumerate() {
            if !input_topology.contains(column.coordinate) {
                return Err(out_of_bounds(column.coordinate));
            }
            if column.synapses.len() != config.potential_synapses_per_column {
                return Err(HtmError::SynapseCountMismatch {
                    column: index,
                    expected: config.potential_synapses_per_column,
                    actual: column.synapses.len(),
                });
            }
            if let Some(syn) = column
                .synapses
                .iter()
                .find(|syn| !input_topology.contains(syn.source))
            {
                return Err(out_of_bounds(syn.source));
            }
        }

        let synapse_permanence_options = SynapsePermanenceOptions {
            active_increment: config.permanence_inc,
            inactive_decrement: config.permanence_inc,
            connected: config.connected_permanence,
            below_duty_increment: config.connected_permanence_bump,
        };

        let mut synapses = Synapses::new(config.columns_count, config.potential_synapses_per_column);
        let mut columns = Vec::with_capacity(config.columns_count);
        for (index, column) in layout.into_iter().enumerate() {
            synapses.init_column(index, &column.synapses, synapse_permanence_options.connected);
            columns.push(Column::new(index, column.coordinate, config.history_window_size));
        }
        let column_coordinates = columns.iter().map(|c| c.coordinate).collect();

        log::info!(
            "[SP] {} columns over a {}x{} input, {} potential synapses each",
            config.columns_count,
            config.input_width,
            config.input_height,
            config.potential_synapses_per_column
        );

        Ok(Self {
            iteration_num: 0,
            iteration_learn_num: 0,
            min_overlap: config.min_overlap,
            desired_local_activity: config.desired_local_activity,
            boost_step: config.boost_step,
            synapse_permanence_options,
            input_topology,
            columns,
            synapses,
            inhibition_radius: InhibitionRadius::new(config.inhibition_radius_initial),
            winner_columns: Vec::with_capacity(config.columns_count),
            column_coordinates,
        })
    }

    /// Processes the current input grid:
    /// - Updates iteration counters.
    /// - Calculates boosted overlaps between columns and their input bits.
    /// - Performs local inhibition to pick winner columns.
    ///
    /// If learning is enabled:
    /// - Updates synapse permanence values of the winners.
    /// - Updates duty cycles, minimal duty cycles and boosts.
    /// - Bumps the permanences of columns that rarely overlap the input.
    /// - Adapts the inhibition radius.
    ///
    /// Returns the winner columns of this tick.
    pub fn compute(&mut self, input: &InputGrid, learn: bool) -> Result<&[usize]> {
        if input.width() != self.input_topology.width()
            || input.height() != self.input_topology.height()
        {
            return Err(HtmError::InputShape {
                expected_width: self.input_topology.width(),
                expected_height: self.input_topology.height(),
                width: input.width(),
                height: input.height(),
            });
        }

        self.update_iteration_number(learn);
        self.calculate_overlaps(input);
        self.inhibit_columns();

        if learn {
            self.adapt_synapses(input);
            self.update_duty_cycles();
            self.update_min_duty_cycles();
            self.update_boost_factors();
            self.bump_up_weak_columns();
            self.update_inhibition_radius();
        }

        log::debug!(
            "[SP] tick {}: {} active columns, inhibition radius {:.3}",
            self.iteration_num,
            self.winner_columns.len(),
            self.inhibition_radius.current()
        );

        Ok(&self.winner_columns)
    }

    /// Increments the global iteration counters, including a separate counter if `learn` is true.
    #[inline]
    pub fn update_iteration_number(&mut self, learn: bool) {
        self.iteration_num += 1;
        if learn {
            self.iteration_learn_num += 1;
        }
    }

    /// Calculates the overlap for each column with the current input:
    /// - Counts how many connected synapses map to an active input bit.
    /// - Zeroes the overlap when that count is below `min_overlap`, otherwise multiplies it by the boost.
    /// - Records the outcome into the column's overlap history.
    pub fn calculate_overlaps(&mut self, input: &InputGrid) {
        for (col, column) in self.columns.iter_mut().enumerate() {
            let raw = self
                .synapses
                .column_connected(col)
                .iter()
                .filter(|syn| input.get(syn.source))
                .count() as f32;

            if raw < self.min_overlap {
                column.overlap = 0.0;
                column.overlap_history.record(false);
            } else {
                column.overlap = raw * column.boost;
                column.overlap_history.record(true);
            }
        }
    }

    /// Implements local inhibition:
    /// - Refreshes a column's neighbor list when the rounded radius changed or none exists yet.
    /// - A column wins iff its overlap is positive and at least the k-th best overlap among its
    ///   neighbors, with `k = min(desired_local_activity, |neighbors|)`.
    /// - Records the outcome into the column's activation history.
    pub fn inhibit_columns(&mut self) {
        let recompute = self.inhibition_radius.needs_recompute();
        let radius = self.inhibition_radius.current();
        self.winner_columns.clear();

        for col in 0..self.columns.len() {
            if recompute || self.columns[col].neighbors.is_none() {
                self.columns[col].neighbors =
                    Some(neighbors_within(col, &self.column_coordinates, radius));
            }

            let min_local_activity = self.kth_score(col);
            let column = &mut self.columns[col];
            let won = column.overlap > 0.0 && column.overlap >= min_local_activity;
            column.active_history.record(won);

            if won {
                self.winner_columns.push(col);
            }

            log::trace!(
                "[SP] column {}: overlap {:.3}, local threshold {:.3}, won {}",
                col,
                self.columns[col].overlap,
                min_local_activity,
                won
            );
        }
    }

    /// Returns the `min(desired_local_activity, |neighbors|)`-th largest overlap among the
    /// neighbors of `col`, or zero for a column without neighbors.
    pub fn kth_score(&self, col: usize) -> f32 {
        let mut overlaps: Vec<f32> = self.columns[col]
            .neighbors()
            .iter()
            .map(|&n| self.columns[n].overlap)
            .collect();

        let k = self.desired_local_activity.min(overlaps.len());
        if k == 0 {
            return 0.0;
        }

        overlaps.sort_unstable_by(|a, b| b.total_cmp(a));
        overlaps[k - 1]
    }

    /// Adjusts synapses for each winner column after an input is processed:
    /// - Increments permanence of synapses whose input bit was active.
    /// - Decrements permanence of synapses whose input bit was inactive.
    /// - Clamps permanence values into [0, 1] and re-sorts connected synapses to the front.
    ///
    /// Implements Hebbian-like learning that shapes columns towards frequently active inputs.
    pub fn adapt_synapses(&mut self, input: &InputGrid) {
        let options = self.synapse_permanence_options;

        for &col in &self.winner_columns {
            for syn in self.synapses.column_mut(col) {
                if input.get(syn.source) {
                    syn.permanence += options.active_increment;
                } else {
                    syn.permanence -= options.inactive_decrement;
                }
            }
            self.synapses
                .update_column_permanences(col, options.connected);
        }
    }

    /// Recomputes the active and overlap duty cycles of every column from its histories.
    pub fn update_duty_cycles(&mut self) {
        self.columns.iter_mut().for_each(Column::update_duty_cycles);
    }

    /// Sets each column's minimal duty cycle to `boost_step` times the highest active duty cycle
    /// among its neighbors (zero for a column without neighbors).
    pub fn update_min_duty_cycles(&mut self) {
        let minimums: Vec<f32> = self
            .columns
            .iter()
            .map(|column| {
                self.boost_step
                    * column
                        .neighbors()
                        .iter()
                        .map(|&n| self.columns[n].active_duty_cycle)
                        .fold(0.0, f32::max)
            })
            .collect();

        for (column, min) in self.columns.iter_mut().zip(minimums) {
            column.min_duty_cycle = min;
        }
    }

    /// Recalculates each column's boost factor based on its active duty cycle:
    /// - If a column is more active than its minimal duty cycle, its boost is reset to 1.0.
    /// - Otherwise its boost grows by the minimal duty cycle.
    pub fn update_boost_factors(&mut self) {
        self.columns.iter_mut().for_each(Column::update_boost);
    }

    /// Increases permanence on "weak" columns that have low overlap duty cycles:
    /// - For each column whose overlap duty cycle is below its minimal duty cycle, bumps all its synapses' permanence.
    /// - Then clamps and re-sorts that column's synapses, so that connected synapses come first.
    ///
    /// Prevents columns from perpetually remaining low-overlap, giving them a chance to learn and stay relevant.
    pub fn bump_up_weak_columns(&mut self) {
        let options = self.synapse_permanence_options;

        for column in self.columns.iter().filter(|c| c.is_overlap_starving()) {
            for syn in self.synapses.column_mut(column.index) {
                syn.permanence += options.below_duty_increment;
            }
            self.synapses
                .update_column_permanences(column.index, options.connected);
            log::trace!("[SP] column {} bumped", column.index);
        }
    }

    /// Sets the inhibition radius to the average distance between every column and its connected
    /// synapses. When no synapse is connected anywhere, the radius keeps its value.
    pub fn update_inhibition_radius(&mut self) {
        let average = average_receptive_field(self.columns.iter().map(|column| {
            (
                column.coordinate,
                self.synapses
                    .column_connected(column.index)
                    .iter()
                    .map(|syn| syn.source),
            )
        }));
        let radius = average.unwrap_or(self.inhibition_radius.current());

        if radius.round() != self.inhibition_radius.current().round() {
            log::debug!(
                "[SP] inhibition radius {:.3} -> {:.3}, neighborhoods will be recomputed",
                self.inhibition_radius.current(),
                radius
            );
        }
        self.inhibition_radius.update(radius);
    }

    /// Number of columns.
    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// The winner columns of the last tick.
    #[inline]
    pub fn active_columns(&self) -> &[usize] {
        &self.winner_columns
    }

    /// The anchors of the winner columns of the last tick.
    pub fn active_column_coordinates(&self) -> Vec<Coordinate> {
        self.winner_columns
            .iter()
            .map(|&col| self.columns[col].coordinate)
            .collect()
    }

    /// All potential synapses of a column, connected ones first.
    #[inline]
    pub fn potential_synapses(&self, col: usize) -> &[Synapse] {
        self.synapses.column(col)
    }

    /// The connected synapses of a column.
    #[inline]
    pub fn connected_synapses(&self, col: usize) -> &[Synapse] {
        self.synapses.column_connected(col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 4x4 grid with one column per row. Column `i` is anchored at `(0, i)` and reads its
    /// whole row; the first `connected[i]` synapses start connected.
    fn row_pooler(connected: [usize; 4], configure: impl FnOnce(&mut HtmConfig)) -> SpatialPooler {
        let mut config = HtmConfig {
            input_width: 4,
            input_height: 4,
            columns_count: 4,
            potential_synapses_per_column: 4,
            min_overlap: 1.0,
            desired_local_activity: 2,
            inhibition_radius_initial: 10.0,
            ..HtmConfig::default()
        };
        configure(&mut config);

        let layout = (0..4)
            .map(|row| ColumnLayout {
                coordinate: Coordinate::new(0, row),
                synapses: (0..4)
                    .map(|x| {
                        let permanence = if x < connected[row] { 0.5 } else { 0.0 };
                        Synapse::new(Coordinate::new(x, row), permanence)
                    })
                    .collect(),
            })
            .collect();

        SpatialPooler::new(&config, layout).unwrap()
    }

    fn all_on() -> InputGrid {
        InputGrid::from_fn(4, 4, |_, _| true)
    }

    #[test]
    fn test_zero_ticks_state() {
        let sp = row_pooler([4, 3, 2, 1], |_| {});
        assert_eq!(sp.iteration_num, 0);
        assert!(sp.active_columns().is_empty());
        for column in &sp.columns {
            assert_eq!(column.overlap, 0.0);
            assert!(!column.is_active());
        }
        assert_eq!(sp.connected_synapses(0).len(), 4);
        assert_eq!(sp.connected_synapses(3).len(), 1);
    }

    #[test]
    fn test_inhibition_selects_desired_local_activity() {
        let mut sp = row_pooler([4, 3, 2, 1], |_| {});
        let winners = sp.compute(&all_on(), false).unwrap().to_vec();
        assert_eq!(winners, vec![0, 1]);

        let mut sp = row_pooler([4, 3, 2, 1], |c| c.desired_local_activity = 1);
        assert_eq!(sp.compute(&all_on(), false).unwrap(), &[0]);

        // k is capped by the neighborhood size (3 neighbors each).
        let mut sp = row_pooler([4, 3, 2, 1], |c| c.desired_local_activity = 10);
        assert_eq!(sp.compute(&all_on(), false).unwrap(), &[0, 1, 2]);
    }

    #[test]
    fn test_min_overlap_excludes_regardless_of_boost() {
        let mut sp = row_pooler([4, 3, 2, 1], |c| {
            c.min_overlap = 2.0;
            c.desired_local_activity = 4;
        });
        sp.columns[3].boost = 100.0;

        let winners = sp.compute(&all_on(), true).unwrap().to_vec();
        assert_eq!(winners, vec![0, 1, 2]);
        assert_eq!(sp.columns[3].overlap, 0.0);
        assert_eq!(sp.columns[3].overlap_history.last(), Some(false));
    }

    #[test]
    fn test_isolated_column_wins_with_any_overlap() {
        let mut sp = row_pooler([4, 3, 2, 1], |c| c.inhibition_radius_initial = 0.0);
        let winners = sp.compute(&all_on(), false).unwrap().to_vec();
        assert_eq!(winners, vec![0, 1, 2, 3]);
        assert!(sp.columns.iter().all(|c| c.neighbors().is_empty()));
    }

    #[test]
    fn test_learning_reinforces_winners_only() {
        let mut sp = row_pooler([4, 3, 2, 1], |c| c.permanence_inc = 0.1);
        let input = InputGrid::from_fn(4, 4, |x, _| x < 2);
        sp.compute(&input, true).unwrap();

        // Columns 0..=2 tie at overlap 2 and all pass; column 3 only sees one bit.
        assert_eq!(sp.active_columns(), &[0, 1, 2]);
        let perms = |col: usize| {
            let mut v: Vec<(usize, f32)> = sp
                .potential_synapses(col)
                .iter()
                .map(|s| (s.source.x, s.permanence))
                .collect();
            v.sort_by_key(|&(x, _)| x);
            v
        };

        let col0 = perms(0);
        assert_relative_eq!(col0[0].1, 0.6);
        assert_relative_eq!(col0[1].1, 0.6);
        assert_relative_eq!(col0[2].1, 0.4);
        assert_relative_eq!(col0[3].1, 0.4);

        let col1 = perms(1);
        assert_relative_eq!(col1[2].1, 0.4);
        assert_relative_eq!(col1[3].1, 0.0);

        let col3 = perms(3);
        assert_relative_eq!(col3[0].1, 0.5);
        assert_relative_eq!(col3[1].1, 0.0);
    }

    #[test]
    fn test_inference_leaves_permanences_untouched() {
        let mut sp = row_pooler([4, 3, 2, 1], |_| {});
        let before: Vec<Synapse> = (0..4).flat_map(|c| sp.potential_synapses(c).to_vec()).collect();

        for _ in 0..5 {
            sp.compute(&all_on(), false).unwrap();
        }

        let after: Vec<Synapse> = (0..4).flat_map(|c| sp.potential_synapses(c).to_vec()).collect();
        assert_eq!(before, after);
        assert_eq!(sp.iteration_learn_num, 0);
        assert_relative_eq!(sp.inhibition_radius.current(), 10.0);
    }

    #[test]
    fn test_radius_adapts_and_neighbors_follow() {
        let mut sp = row_pooler([4, 3, 2, 1], |_| {});
        sp.compute(&all_on(), true).unwrap();

        // Connected distances: 0+1+2+3, 0+1+2, 0+1, 0 over ten synapses.
        assert_relative_eq!(sp.inhibition_radius.current(), 1.0);
        assert_eq!(sp.columns[0].neighbors(), &[1, 2, 3]);

        sp.compute(&all_on(), true).unwrap();
        assert_eq!(sp.columns[0].neighbors(), &[1]);
        assert_eq!(sp.columns[1].neighbors(), &[0, 2]);
    }

    #[test]
    fn test_starving_column_is_boosted_and_bumped() {
        let mut sp = row_pooler([4, 3, 2, 1], |c| {
            c.desired_local_activity = 4;
            c.connected_permanence_bump = 0.02;
        });
        let input = InputGrid::from_fn(4, 4, |_, y| y < 3);
        sp.compute(&input, true).unwrap();

        let starving = &sp.columns[3];
        assert!(!starving.is_active());
        assert_relative_eq!(starving.min_duty_cycle, 0.01);
        assert_relative_eq!(starving.boost, 1.01);
        let mut perms: Vec<f32> = sp.potential_synapses(3).iter().map(|s| s.permanence).collect();
        perms.sort_by(|a, b| a.total_cmp(b));
        assert_relative_eq!(perms[0], 0.02);
        assert_relative_eq!(perms[3], 0.52);

        assert_eq!(sp.columns[0].boost, 1.0);
    }

    #[test]
    fn test_rejects_bad_input_shape() {
        let mut sp = row_pooler([4, 3, 2, 1], |_| {});
        let err = sp.compute(&InputGrid::new(3, 4), true).unwrap_err();
        assert!(matches!(err, HtmError::InputShape { width: 3, .. }));
        assert_eq!(sp.iteration_num, 0);
    }

    #[test]
    fn test_rejects_mismatched_layout() {
        let config = HtmConfig {
            input_width: 4,
            input_height: 4,
            columns_count: 4,
            potential_synapses_per_column: 2,
            ..HtmConfig::default()
        };
        let column = |x: usize, n: usize| ColumnLayout {
            coordinate: Coordinate::new(x, 0),
            synapses: vec![Synapse::new(Coordinate::new(x, 1), 0.5); n],
        };

        let err = SpatialPooler::new(&config, vec![column(0, 2)]).err().unwrap();
        assert!(matches!(
            err,
            HtmError::ColumnCountMismatch {
                expected: 4,
                actual: 1
            }
        ));

        let layout = vec![column(0, 2), column(1, 2), column(2, 3), column(3, 2)];
        let err = SpatialPooler::new(&config, layout).err().unwrap();
        assert!(matches!(err, HtmError::SynapseCountMismatch { column: 2, .. }));

        let layout = vec![column(0, 2), column(1, 2), column(2, 2), column(9, 2)];
        let err = SpatialPooler::new(&config, layout).err().unwrap();
        assert!(matches!(err, HtmError::CoordinateOutOfBounds { x: 9, .. }));
    }
}
