//! Parameters shared by the spatial and temporal poolers.
//!
//! Every parameter is explicit: the engine never reaches for a hidden constant. The
//! `Default` implementation is a documented starting point that suits small grids,
//! and `HtmConfig::from_json` loads a full parameter set from a JSON document.

use crate::error::{HtmError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a region (spatial pooler + temporal pooler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmConfig {
    /// Width of the boolean input grid.
    pub input_width: usize,

    /// Height of the boolean input grid.
    pub input_height: usize,

    /// Number of spatial columns.
    pub columns_count: usize,

    /// Number of proximal synapses every column owns. Fixed after construction.
    pub potential_synapses_per_column: usize,

    /// Columns whose raw overlap falls below this value are zeroed and cannot win.
    pub min_overlap: f32,

    /// How many columns may win inside one inhibition neighborhood.
    pub desired_local_activity: usize,

    /// Permanence step used for reinforcement (and for proximal decay).
    pub permanence_inc: f32,

    /// Permanence step used to weaken lateral synapses.
    pub permanence_dec: f32,

    /// A synapse is connected iff its permanence is strictly above this value.
    pub connected_permanence: f32,

    /// Permanence given to newly grown lateral synapses.
    pub initial_permanence: f32,

    /// Fraction of the neighborhood's peak active duty cycle that defines a column's
    /// minimal duty cycle. Boost grows by that minimal duty cycle each starved tick.
    pub boost_step: f32,

    /// Permanence added to every potential synapse of a column whose overlap duty
    /// cycle drops below its minimal duty cycle.
    pub connected_permanence_bump: f32,

    /// Capacity of the overlap and activation history ring buffers.
    pub history_window_size: usize,

    /// A segment is active when strictly more connected synapses than this fire.
    pub activation_threshold: usize,

    /// A segment matches (for best-match searches) when strictly more synapses than this fire.
    pub min_threshold: usize,

    /// Target number of active synapses a learning segment is grown towards.
    pub new_synapse_count: usize,

    /// Cells stacked in every column.
    pub cells_per_column: usize,

    /// Starting half-width of the inhibition neighborhood, in input-grid units.
    pub inhibition_radius_initial: f32,

    /// Seed of the random generator owned by each engine.
    pub seed: u64,
}

impl Default for HtmConfig {
    fn default() -> Self {
        Self {
            input_width: 12,
            input_height: 12,
            columns_count: 9,
            potential_synapses_per_column: 32,
            min_overlap: 2.0,
            desired_local_activity: 1,
            permanence_inc: 0.05,
            permanence_dec: 0.02,
            connected_permanence: 0.2,
            initial_permanence: 0.3,
            boost_step: 0.01,
            connected_permanence_bump: 0.02,
            history_window_size: 1000,
            activation_threshold: 1,
            min_threshold: 0,
            new_synapse_count: 4,
            cells_per_column: 4,
            inhibition_radius_initial: 5.0,
            seed: 42,
        }
    }
}

impl HtmConfig {
    /// Parses a configuration from JSON and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of cells in the input grid.
    #[inline]
    pub fn input_size(&self) -> usize {
        self.input_width * self.input_height
    }

    /// Checks every parameter for consistency. Called by all engine constructors.
    pub fn validate(&self) -> Result<()> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(HtmError::InvalidParameter(format!(
                "input grid must be non-empty, got {}x{}",
                self.input_width, self.input_height
            )));
        }
        if self.columns_count == 0 {
            return Err(HtmError::InvalidParameter(
                "columns_count must be at least 1".into(),
            ));
        }
        if self.columns_count > self.input_size() {
            return Err(HtmError::InvalidParameter(format!(
                "columns_count ({}) exceeds the number of input cells ({})",
                self.columns_count,
                self.input_size()
            )));
        }
        if self.potential_synapses_per_column == 0
            || self.potential_synapses_per_column > self.input_size()
        {
            return Err(HtmError::InvalidParameter(format!(
                "potential_synapses_per_column must be in 1..={}, got {}",
                self.input_size(),
                self.potential_synapses_per_column
            )));
        }
        if self.cells_per_column == 0 {
            return Err(HtmError::InvalidParameter(
                "cells_per_column must be at least 1".into(),
            ));
        }
        if self.desired_local_activity == 0 {
            return Err(HtmError::InvalidParameter(
                "desired_local_activity must be at least 1".into(),
            ));
        }
        if self.history_window_size == 0 {
            return Err(HtmError::InvalidParameter(
                "history_window_size must be at least 1".into(),
            ));
        }
        if self.min_threshold > self.activation_threshold {
            return Err(HtmError::InvalidParameter(format!(
                "min_threshold ({}) must not exceed activation_threshold ({})",
                self.min_threshold, self.activation_threshold
            )));
        }

        let unit_params = [
            ("permanence_inc", self.permanence_inc),
            ("permanence_dec", self.permanence_dec),
            ("connected_permanence", self.connected_permanence),
            ("initial_permanence", self.initial_permanence),
            ("connected_permanence_bump", self.connected_permanence_bump),
            ("boost_step", self.boost_step),
        ];
        for (name, value) in unit_params {
            if !(0.0..=1.0).contains(&value) {
                return Err(HtmError::InvalidParameter(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if !(self.min_overlap >= 0.0) {
            return Err(HtmError::InvalidParameter(format!(
                "min_overlap must be non-negative, got {}",
                self.min_overlap
            )));
        }
        if !(self.inhibition_radius_initial >= 0.0) {
            return Err(HtmError::InvalidParameter(format!(
                "inhibition_radius_initial must be non-negative, got {}",
                self.inhibition_radius_initial
            )));
        }

        Ok(())
    }
}
